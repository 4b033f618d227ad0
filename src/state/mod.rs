// 变量池模块

mod pool;
mod segment;

pub use pool::{Selector, VariablePool, SYSTEM_FILES_KEY, SYSTEM_VARIABLE_NODE_ID};
pub use segment::Segment;
