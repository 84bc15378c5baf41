use crate::gui_bridge::model::DetectionStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, thread};
use tokio::runtime::Builder;
use trackcore::geo::GeoPoint;
use trackcore::prelude::{DashboardError, DashboardResult};
use trackcore::query::{DetectionQuery, DetectionResponse, DetectionsResponse, LatestResponse};
use warp::{
    http::StatusCode,
    reply::{Json, WithStatus},
    Filter, Rejection, Reply,
};

pub fn bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9000))
}

#[derive(Debug, Deserialize)]
struct IdsQuery {
    ids: String,
}

impl IdsQuery {
    fn split(&self) -> Vec<String> {
        self.ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }
}

fn respond<T: Serialize>(result: DashboardResult<T>) -> WithStatus<Json> {
    match result {
        Ok(body) => warp::reply::with_status(warp::reply::json(&body), StatusCode::OK),
        Err(err) => {
            let status = match err {
                DashboardError::Validation(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            log::warn!("query bridge request failed: {}", err);
            warp::reply::with_status(
                warp::reply::json(&json!({ "error": err.to_string() })),
                status,
            )
        }
    }
}

fn detections(
    result: DashboardResult<Vec<trackcore::query::Detection>>,
) -> Result<WithStatus<Json>, Infallible> {
    Ok(respond(result.map(|detections| DetectionsResponse { detections })))
}

/// HTTP face of a [`DetectionStore`], shaped like the production detection
/// and search routers.
pub struct QueryBridge {
    store: Arc<DetectionStore>,
}

impl QueryBridge {
    pub fn new(store: Arc<DetectionStore>) -> Self {
        Self { store }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        let store = self.store.clone();
        let with_store = warp::any().map(move || store.clone());

        let list = warp::path!("api" / "detection")
            .and(with_store.clone())
            .and_then(|store: Arc<DetectionStore>| async move {
                detections(store.list_detections().await)
            });

        let latest = warp::path!("api" / "detection" / "latest")
            .and(with_store.clone())
            .and_then(|store: Arc<DetectionStore>| async move {
                Ok::<_, Infallible>(respond(
                    store
                        .latest_detections()
                        .await
                        .map(|latest| LatestResponse { latest }),
                ))
            });

        let by_id = warp::path!("api" / "detection" / String)
            .and(with_store.clone())
            .and_then(|id: String, store: Arc<DetectionStore>| async move {
                let reply = match store.get_detection(&id).await {
                    Ok(Some(detection)) => respond(Ok(DetectionResponse { detection })),
                    Ok(None) => warp::reply::with_status(
                        warp::reply::json(&json!({ "error": "Detection not found" })),
                        StatusCode::NOT_FOUND,
                    ),
                    Err(err) => respond::<DetectionResponse>(Err(err)),
                };
                Ok::<_, Infallible>(reply)
            });

        let ids = warp::path!("api" / "search" / "ids")
            .and(warp::query::<IdsQuery>())
            .and(with_store.clone())
            .and_then(|query: IdsQuery, store: Arc<DetectionStore>| async move {
                detections(store.search_by_ids(&query.split()).await)
            });

        let ids_summary = warp::path!("api" / "search" / "ids" / "summary")
            .and(warp::query::<IdsQuery>())
            .and(with_store.clone())
            .and_then(|query: IdsQuery, store: Arc<DetectionStore>| async move {
                detections(store.search_ids_summary(&query.split()).await)
            });

        let model = warp::path!("api" / "search" / "model" / String)
            .and(with_store.clone())
            .and_then(|model: String, store: Arc<DetectionStore>| async move {
                detections(store.search_by_model(&model).await)
            });

        let model_and_id = warp::path!("api" / "search" / "model" / String / "id" / String)
            .and(with_store.clone())
            .and_then(
                |model: String, id: String, store: Arc<DetectionStore>| async move {
                    detections(store.search_by_model_and_id(&model, &id).await)
                },
            );

        let time = warp::path!("api" / "search" / "time" / String / String)
            .and(with_store.clone())
            .and_then(
                |from: String, to: String, store: Arc<DetectionStore>| async move {
                    detections(store.search_by_time(&from, &to).await)
                },
            );

        let location = warp::path!("api" / "search" / "location" / f64 / f64 / f64)
            .and(with_store)
            .and_then(
                |lat: f64, lng: f64, radius: f64, store: Arc<DetectionStore>| async move {
                    detections(
                        store
                            .search_by_location(GeoPoint::new(lat, lng), radius)
                            .await,
                    )
                },
            );

        warp::get().and(
            latest
                .or(list)
                .or(by_id)
                .or(ids_summary)
                .or(ids)
                .or(model_and_id)
                .or(model)
                .or(time)
                .or(location),
        )
    }

    /// Serves the routes on a dedicated thread with its own runtime.
    pub fn serve(self, address: SocketAddr) -> thread::JoinHandle<()> {
        let routes = self.routes();
        thread::spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!("failed to build query bridge runtime: {}", err);
                    return;
                }
            };
            log::info!("query bridge listening on http://{}", address);
            runtime.block_on(async move {
                warp::serve(routes).run(address).await;
            });
        })
    }
}
