use std::io;

use actix_web::{
    http::{header::ContentType, Method, StatusCode},
    web::{self, Data},
    App, HttpRequest, HttpResponse, HttpServer, ResponseError,
};
use common::req::{EarliestTimestamp, ErrorResponse, VersionResponse};
use log::{debug, error, info};

use crate::{
    db::{Store, StoreError},
    reading::Reading,
    req::{self, Request, RequestError},
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Method not allowed: {0}.")]
    Method(Method),

    #[error("Could not query the store: {0}")]
    Store(#[from] StoreError),

    #[error("Could not render the response: {0}")]
    Render(#[from] serde_json::Error),

    #[error("Could not query the store: worker pool is gone")]
    Cancelled,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Request(RequestError::NoCommand | RequestError::UnknownCommand(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Request(_) => StatusCode::BAD_REQUEST,
            ApiError::Method(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Store(_) | ApiError::Render(_) | ApiError::Cancelled => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

/// Runs a store operation on the blocking pool.
async fn query<T, F>(store: &Data<Store>, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&Store) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    web::block(move || op(&store))
        .await
        .map_err(|_| ApiError::Cancelled)?
        .map_err(|err| {
            error!("Could not query the store: {err}");
            ApiError::from(err)
        })
}

async fn dispatch(req: HttpRequest, store: Data<Store>) -> Result<HttpResponse, ApiError> {
    if req.method() != Method::GET {
        return Err(ApiError::Method(req.method().clone()));
    }

    let request = req::parse(req.path(), req.query_string())?;
    debug!("{} -> {request:?}", req.uri());

    let body = match request {
        Request::GetVersion => serde_json::to_string(&VersionResponse::default())?,
        Request::GetEarliestTimestamp => {
            let timestamp = query(&store, Store::fetch_earliest_archive_timestamp).await?;
            serde_json::to_string(&EarliestTimestamp { timestamp })?
        }
        Request::FetchCurrent => match query(&store, Store::fetch_current).await? {
            Some(reading) => reading.to_json()?,
            None => "{}".to_string(),
        },
        Request::FetchArchive {
            since_ts,
            max_ts,
            limit,
        } => {
            let readings =
                query(&store, move |store| store.fetch_archive(since_ts, max_ts, limit)).await?;
            let wire: Vec<_> = readings.iter().map(Reading::to_wire).collect();
            serde_json::to_string(&wire)?
        }
    };

    Ok(HttpResponse::Ok()
        .content_type(ContentType::json())
        .body(body))
}

/// Routes every path through the request table.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.default_service(web::to(dispatch));
}

pub async fn new_http_server(store: Store, port: u16) -> io::Result<()> {
    info!("Query server listening on 0.0.0.0:{port}");
    let store = Data::new(store);
    HttpServer::new(move || App::new().app_data(store.clone()).configure(configure))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
