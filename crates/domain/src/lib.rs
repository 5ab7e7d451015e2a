//! 买卖双方消息系统核心领域模型
//!
//! 包含会话、消息、参与者等核心实体，以及相关的业务不变量。
//! 本层不做任何 I/O，存储与推送通过外层端口接入。

pub mod entities;
pub mod errors;
pub mod value_objects;

// 重新导出常用类型
pub use entities::*;
pub use errors::*;
pub use value_objects::*;
