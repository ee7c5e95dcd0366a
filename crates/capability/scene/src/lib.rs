//! # Scene 协作者模块
//!
//! 运行时与宿主场景之间的边界。绑定运行时不拥有场景，只通过接口读取与写回：
//!
//! 1. **接口层** (`traits.rs`)：`SceneGraph`（层级 + 元数据，只读）与
//!    `AttributeStore`（类型化属性写回，异步）
//! 2. **数据模型层** (`models.rs`)：实体、属性记录与 JSON 场景文档
//! 3. **错误处理层** (`error.rs`)：统一的场景错误类型
//! 4. **实现层** (`in_memory/`)：`RwLock<BTreeMap>` 内存场景，同时实现两个接口
//!
//! ## 场景文档格式
//!
//! ```json
//! {
//!   "entities": [
//!     {
//!       "path": "/World",
//!       "metadata": { "binding:context": { "broker": "mqtt://localhost:1883" } },
//!       "attributes": []
//!     },
//!     {
//!       "path": "/World/Pump",
//!       "attributes": [
//!         {
//!           "name": "temperature",
//!           "type": "double",
//!           "metadata": {
//!             "binding:protocol": "mqtt",
//!             "binding:uri": "${broker}",
//!             "binding:topic": "plant/pump/temperature",
//!             "binding:operation": "stream"
//!           }
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```

pub mod error;
pub mod in_memory;
pub mod models;
pub mod traits;

pub use error::SceneError;
pub use in_memory::*;
pub use models::{AttributeRecord, EntityRecord, SceneDocument, parent_path};
pub use traits::{AttributeStore, SceneGraph};
