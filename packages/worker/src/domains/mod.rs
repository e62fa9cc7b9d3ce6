pub mod crawling;

use crate::kernel::jobs::HandlerRegistry;

/// Registry with every built-in handler.
pub fn build_handler_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    crawling::jobs::register(&mut registry);
    registry
}
