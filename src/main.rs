mod broadcast;
mod codes;
mod messages;
mod registry;
mod room;
mod server;
mod session;

use log::info;
use serde::Deserialize;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::Filter;

use messages::JoinError;
use server::{JoinForm, Server};

#[derive(Deserialize)]
struct WsQuery {
    ticket: Uuid,
}

fn join_status(err: JoinError) -> StatusCode {
    match err {
        JoinError::RoomNotFound => StatusCode::NOT_FOUND,
        JoinError::NameTaken => StatusCode::CONFLICT,
        JoinError::MissingName | JoinError::MissingCode | JoinError::MissingIntent => {
            StatusCode::BAD_REQUEST
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(2052);

    let server = Server::new();

    let join_server = server.clone();
    let join_route = warp::path("join")
        .and(warp::post())
        .and(warp::body::form())
        .and_then(move |form: JoinForm| {
            let server = join_server.clone();
            async move {
                let reply = match server.validate_join(&form).await {
                    Ok(grant) => warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({
                            "code": grant.room_code,
                            "ticket": grant.ticket,
                        })),
                        StatusCode::OK,
                    ),
                    Err(err) => warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({ "error": err.to_string() })),
                        join_status(err),
                    ),
                };
                Ok::<_, warp::Rejection>(reply)
            }
        });

    let ws_server = server.clone();
    let ws_route = warp::path("ws")
        .and(warp::ws())
        .and(warp::query::<WsQuery>())
        .map(move |ws: warp::ws::Ws, query: WsQuery| {
            let server = ws_server.clone();
            ws.on_upgrade(move |socket| async move {
                server.handle_connection(socket, query.ticket).await;
            })
        });

    let rooms_server = server.clone();
    let rooms_route = warp::path!("rooms" / String)
        .and(warp::get())
        .and_then(move |code: String| {
            let server = rooms_server.clone();
            async move {
                let reply = match server.room_snapshot(&code).await {
                    Some(snapshot) => {
                        warp::reply::with_status(warp::reply::json(&snapshot), StatusCode::OK)
                    }
                    None => warp::reply::with_status(
                        warp::reply::json(&serde_json::json!({
                            "error": JoinError::RoomNotFound.to_string(),
                        })),
                        StatusCode::NOT_FOUND,
                    ),
                };
                Ok::<_, warp::Rejection>(reply)
            }
        });

    let static_files = warp::fs::dir("public");

    let routes = join_route
        .or(ws_route)
        .or(rooms_route)
        .or(static_files)
        .with(warp::cors().allow_any_origin());

    info!("chat relay listening on port {port}");
    warp::serve(routes).run(([0, 0, 0, 0], port)).await;
}
