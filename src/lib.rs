//! Gimlet - scoped parameter configuration for registered callables
//!
//! Config text binds values to parameters of registered configurables,
//! optionally restricted to scopes:
//!
//! ```text
//! import my.models
//!
//! learning_rate = 0.1
//!
//! train.optimizer = @Adam
//! Adam.rate = %learning_rate
//! eval/Model.dropout = 0.0
//! ```
//!
//! A [`Config`] holds the registry, the bindings and the scope stacks; calls
//! through it receive the bindings visible under the active scope.

pub mod binding;
pub mod config;
pub mod error;
pub mod parser;
pub mod reader;
pub mod reference;
pub mod render;
pub mod scope;
pub mod selector_map;
pub mod settings;
pub mod signature;
pub mod value;

pub use binding::{BindingKey, BindingStore, IntoBindingKey, Params};
pub use config::{
    Config, Configurable, FinalizeHook, ImportHook, IncludeTree, InteractiveGuard, Registration,
    ScopedCallable, SkipUnknown, UnlockGuard,
};
pub use error::{FixSuggestion, GimletError, Location, ParseError};
pub use parser::{ImportStatement, ParserDelegate, Statement, SyntaxDelegate};
pub use reader::{FileReader, FsReader, MemoryReader};
pub use reference::{Reference, CONSTANT_SELECTOR, MACRO_SELECTOR, SINGLETON_SELECTOR};
pub use render::{RenderInput, RenderOptions};
pub use scope::{ScopeGuard, ScopePath};
pub use selector_map::SelectorMap;
pub use settings::Settings;
pub use signature::{ArgumentError, Arguments, CallArgs, FnTarget, Signature, Target};
pub use value::Value;
