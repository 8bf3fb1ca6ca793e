//! 应用层：路由与处理器

pub mod health;
pub mod todo;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    handler::HandlerWithoutStateExt,
    middleware,
    routing::{get, patch},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::infrastructure::database::{ConnectionManager, Connector};
use crate::web::{
    error::ApiError,
    middleware::{request_logging_middleware, timeout_error_body},
};
use todo::{handler, TodoService};

/// 处理器共享的应用状态
pub struct AppState<C: Connector> {
    pub db: Arc<ConnectionManager<C>>,
    pub todos: TodoService<C>,
}

impl<C: Connector> AppState<C> {
    pub fn new(db: Arc<ConnectionManager<C>>) -> Self {
        Self {
            todos: TodoService::new(Arc::clone(&db)),
            db,
        }
    }
}

impl<C: Connector> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            todos: self.todos.clone(),
        }
    }
}

/// 路由选项
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// 静态文件目录
    pub static_dir: Option<PathBuf>,
    /// 单个请求的最长处理时间
    pub request_timeout: Duration,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            static_dir: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl RouterOptions {
    /// 静态目录不存在时不挂载
    pub fn from_config(config: &ServerConfig) -> Self {
        let dir = PathBuf::from(&config.static_dir);
        Self {
            static_dir: dir.is_dir().then_some(dir),
            request_timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}

/// 创建路由
///
/// 未匹配的请求先尝试静态文件目录（如果提供），最后返回 404。
pub fn build_router<C: Connector>(state: AppState<C>, options: RouterOptions) -> Router {
    let routes = Router::new()
        .route(
            "/api/todos",
            get(handler::list_todos::<C>)
                .post(handler::create_todo::<C>)
                .fallback(route_not_found),
        )
        .route(
            "/api/todos/:id",
            get(handler::get_todo::<C>)
                .put(handler::update_todo::<C>)
                .delete(handler::delete_todo::<C>)
                .fallback(route_not_found),
        )
        .route(
            "/api/todos/:id/toggle",
            patch(handler::toggle_todo::<C>).fallback(route_not_found),
        )
        .route(
            "/health",
            get(health::health_check::<C>).fallback(route_not_found),
        );

    let routes = match options.static_dir {
        Some(dir) => routes.fallback_service(
            ServeDir::new(dir)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(route_not_found.into_service()),
        ),
        None => routes.fallback(route_not_found),
    };

    routes
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(middleware::map_response(timeout_error_body))
                .layer(TimeoutLayer::new(options.request_timeout))
                .layer(middleware::from_fn(request_logging_middleware)),
        )
        .with_state(state)
}
