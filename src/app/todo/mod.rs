//! 待办事项 CRUD

pub mod handler;
pub mod model;
pub mod service;

pub use model::{CreateTodoRequest, Todo, TodoDraft, UpdateTodoRequest};
pub use service::TodoService;
