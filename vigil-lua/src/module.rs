use mlua::prelude::*;

/// Trait for modules exposed to test scripts.
///
/// A module owns one global table in the sandbox (`log`, `job`, `browser`, ...)
/// and knows how to describe itself to the Lua Language Server so script
/// authors get completion for it.
///
/// # Example
///
/// ```rust
/// use vigil_lua::module::VigilModule;
/// use mlua::prelude::*;
///
/// struct ClockModule;
///
/// impl VigilModule for ClockModule {
///     fn id(&self) -> &'static str {
///         "clock"
///     }
///
///     fn register(&self, lua: &Lua) -> LuaResult<()> {
///         let clock = lua.create_table()?;
///         clock.set("zone", "UTC")?;
///         lua.globals().set(self.id(), clock)?;
///         Ok(())
///     }
///
///     fn stubs(&self) -> String {
///         "---@meta\n---@class clock\nclock = {}\n".to_string()
///     }
/// }
/// ```
pub trait VigilModule: Send + Sync {
    /// Global name of the module inside the sandbox.
    ///
    /// Must be a valid, lowercase Lua identifier that no other module uses.
    fn id(&self) -> &'static str;

    /// Installs the module's table into the Lua state.
    fn register(&self, lua: &Lua) -> LuaResult<()>;

    /// LuaLS definition file for this module, starting with `---@meta`.
    fn stubs(&self) -> String;

    fn metadata(&self) -> ModuleMetadata {
        ModuleMetadata {
            id: self.id(),
            version: "0.1.0",
            description: "",
        }
    }
}

/// Metadata about a script module
#[derive(Debug, Clone)]
pub struct ModuleMetadata {
    pub id: &'static str,
    pub version: &'static str,
    pub description: &'static str,
}

/// Ordered set of modules installed into every script sandbox
pub struct ModuleRegistry {
    modules: Vec<Box<dyn VigilModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
        }
    }

    /// Adds a module
    ///
    /// # Panics
    /// Panics if a module with the same id is already registered; module ids
    /// are fixed at compile time so this is a programming error.
    pub fn register<M: VigilModule + 'static>(&mut self, module: M) {
        let id = module.id();
        if self.modules.iter().any(|m| m.id() == id) {
            panic!("Module with id '{}' is already registered", id);
        }
        self.modules.push(Box::new(module));
    }

    pub fn get(&self, id: &str) -> Option<&dyn VigilModule> {
        self.modules
            .iter()
            .find(|m| m.id() == id)
            .map(|m| m.as_ref())
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.id()).collect()
    }

    /// Installs every module into `lua`, stopping at the first failure
    pub fn register_all(&self, lua: &Lua) -> LuaResult<()> {
        for module in &self.modules {
            module.register(lua)?;
        }
        Ok(())
    }

    /// Concatenated LuaLS stubs for all modules
    pub fn generate_stubs(&self) -> String {
        self.modules
            .iter()
            .map(|m| m.stubs())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstModule(&'static str);

    impl VigilModule for ConstModule {
        fn id(&self) -> &'static str {
            self.0
        }

        fn register(&self, lua: &Lua) -> LuaResult<()> {
            let table = lua.create_table()?;
            table.set("value", 42)?;
            lua.globals().set(self.id(), table)?;
            Ok(())
        }

        fn stubs(&self) -> String {
            format!("---@meta\n---@class {0}\n{0} = {{}}", self.0)
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ModuleRegistry::new();
        registry.register(ConstModule("alpha"));
        registry.register(ConstModule("beta"));

        assert!(registry.get("alpha").is_some());
        assert!(registry.get("gamma").is_none());
        assert_eq!(registry.ids(), vec!["alpha", "beta"]);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration() {
        let mut registry = ModuleRegistry::new();
        registry.register(ConstModule("alpha"));
        registry.register(ConstModule("alpha"));
    }

    #[test]
    fn test_register_all_installs_globals() {
        let mut registry = ModuleRegistry::new();
        registry.register(ConstModule("alpha"));

        let lua = Lua::new();
        registry.register_all(&lua).unwrap();

        let value: i32 = lua.load("return alpha.value").eval().unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_stub_generation() {
        let mut registry = ModuleRegistry::new();
        registry.register(ConstModule("alpha"));
        registry.register(ConstModule("beta"));

        let stubs = registry.generate_stubs();
        assert!(stubs.contains("alpha = {}"));
        assert!(stubs.contains("beta = {}"));
    }
}
