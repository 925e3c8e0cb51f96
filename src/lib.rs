pub mod component;
pub mod config;
pub mod dtype;
pub mod executor;
pub mod observer;
pub mod ops;
pub mod space;

pub use component::{
    AssemblyError, Component, ComponentGraph, ComponentId, Connection, FlattenMode, GraphFnCall, GraphFnId,
    GraphFnOptions, GraphFunction, MethodRegistry, ResolvedGraph, Socket, SocketDirection, SocketId,
};
pub use config::{AssemblyConfig, ConfigError};
pub use dtype::DType;
pub use executor::symbolic::SymbolicExecutor;
pub use executor::{ExecutorError, GraphExecutor};
pub use observer::{AssemblyEvent, AssemblyObserver, RecordingObserver};
pub use ops::{ConstantValue, DataOp, FlattenError, FlattenedDataOp, OpHandle, OpSet};
pub use space::{BoxSpace, Space, SpaceError};
