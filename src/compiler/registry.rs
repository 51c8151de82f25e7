use std::collections::BTreeMap;

use anyhow::Result;

use super::{Compiler, JdkBackend, NativeBackend, Python3Backend, RBackend, SyntaxCheckBackend};
use crate::error::JudgeError;

type Factory = Box<dyn Fn() -> Box<dyn Compiler>>;

/// Map from compiler id to backend, fixed once built.
pub struct Registry {
    factories: BTreeMap<String, Factory>,
}

#[derive(Default)]
pub struct RegistryBuilder {
    factories: BTreeMap<String, Factory>,
}

/// "G++" and "GXX" name the same backend
pub fn normalize_id(id: &str) -> String {
    id.replace("++", "XX")
}

impl RegistryBuilder {
    pub fn register<F, C>(mut self, id: &str, factory: F) -> Self
    where
        F: Fn() -> C + 'static,
        C: Compiler + 'static,
    {
        self.factories.insert(
            normalize_id(id),
            Box::new(move || Box::new(factory()) as Box<dyn Compiler>),
        );
        self
    }

    pub fn build(self) -> Registry {
        Registry {
            factories: self.factories,
        }
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builder preloaded with every backend this grader ships
    pub fn standard_builder() -> RegistryBuilder {
        Self::builder()
            .register("GCC", NativeBackend::gcc)
            .register("Clang", NativeBackend::clang)
            .register("GXX", NativeBackend::gxx)
            .register("GXX11", NativeBackend::gxx11)
            .register("GXX17", NativeBackend::gxx17)
            .register("P1XX", NativeBackend::p1xx)
            .register("ClangXX17", NativeBackend::clangxx17)
            .register("JDK", JdkBackend::default)
            .register("Python3", Python3Backend::default)
            .register("R", RBackend::default)
            .register("Ruby", SyntaxCheckBackend::ruby)
            .register("Perl", SyntaxCheckBackend::perl)
    }

    pub fn standard() -> Self {
        Self::standard_builder().build()
    }

    pub fn create(&self, id: &str) -> Result<Box<dyn Compiler>> {
        let factory = self
            .factories
            .get(&normalize_id(id))
            .ok_or_else(|| JudgeError::UnknownCompiler(id.to_string()))?;
        Ok(factory())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(&normalize_id(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
