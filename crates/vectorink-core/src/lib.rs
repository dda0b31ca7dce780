//! VectorInk Core Library
//!
//! Shape documents, touch-driven drawing and editing commands, snapping,
//! an on-disk undo/redo journal and the double buffers that let render
//! threads read a consistent snapshot while the document is edited.

pub mod buffer;
pub mod camera;
pub mod commands;
pub mod config;
pub mod doc;
pub mod input;
pub mod record;
pub mod render;
pub mod selection;
pub mod shapes;
pub mod snap;
pub mod storage;
pub mod view;

pub use buffer::{FrontBuffers, Playing};
pub use camera::Camera;
pub use commands::{CmdContext, CmdEvents, CmdManager, Command, CommandParams, ContextAction};
pub use config::{ConfigError, EngineConfig};
pub use doc::ShapeDoc;
pub use input::{GestureDispatcher, GestureState, GestureType, Motion, Route};
pub use record::{RecordError, RecordShapes};
pub use render::{DrawOp, HandleStyle, RecordingSurface, Surface};
pub use shapes::{DrawContext, Shape, ShapeId, ShapeKind, ShapeList, ShapeTrait, ShapeType};
pub use snap::{SnapEngine, SnapType};
pub use storage::{JsonStorage, Storage, StorageError};
pub use view::{CoreView, DrawLocker, ViewCallback};
