pub mod api;
pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod messages;
pub mod presence;
pub mod relay;
pub mod server;
pub mod signaling;
pub mod store;
pub mod tls;

use warp::{Filter, Rejection, Reply};

use server::Server;

/// The WebSocket endpoint at `/ws` plus the HTTP API, with CORS open to
/// any origin.
pub fn routes(server: Server) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let ws_server = server.clone();
    let ws_route = warp::path("ws")
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let server = ws_server.clone();
            ws.on_upgrade(move |socket| async move {
                server.handle_connection(socket).await;
            })
            .into_response()
        });

    ws_route
        .or(api::routes(server))
        .unify()
        .with(warp::cors().allow_any_origin())
}
