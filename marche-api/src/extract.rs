use axum::extract::FromRequest;

use crate::error::AppError;

/// `Json` whose rejections answer like every other validation failure.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
