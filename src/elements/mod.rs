//! 可标记元素：两个数据源与合并解析器

pub mod resolver;
pub mod sources;

pub use resolver::{TaggableElement, TaggableElementResolver};
pub use sources::{ElementSource, GlobalCatalogSource, LocalScriptSource};
