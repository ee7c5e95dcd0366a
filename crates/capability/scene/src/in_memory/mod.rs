//! 内存场景实现模块
//!
//! 用于宿主进程加载 JSON 场景文档，以及各模块的测试。

pub mod scene;

pub use scene::*;
