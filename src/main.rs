mod alerts;
mod config;
mod departures;
mod error;
mod itinerary;
mod prim;
mod sources;
mod state;

use std::env;
use std::sync::Arc;

use actix_web::{get, middleware::Logger, web, App, HttpResponse, HttpServer, Responder};
use chrono::Utc;
use chrono_tz::Europe::Paris;
use serde::Serialize;
use tokio::select;
use tokio_util::sync::CancellationToken;

use departures::Normalizer;
use error::{BoardError, BoardResult};
use itinerary::RoutePlanner;
use prim::client::PrimClient;
use prim::siri::parse_time;
use state::{BoardState, Enveloped, Snapshot};

#[derive(Clone)]
pub struct ContextData {
    client: PrimClient,
    state: Arc<BoardState>,
    normalizer: Arc<Normalizer>,
    planner: Arc<RoutePlanner>,
}

fn envelope<T, V>(snapshot: &Snapshot<T>, view: Option<V>) -> web::Json<Enveloped<V>>
where
    V: Serialize,
{
    web::Json(Enveloped {
        data: view,
        error: snapshot.error.clone(),
        updated_at: snapshot.updated_at,
    })
}

/// Envelope for the on-demand endpoints. Upstream failures become the
/// envelope's error field, never a non-2xx response.
fn live_envelope<V>(result: prim::error::PrimResult<V>) -> Enveloped<V>
where
    V: Serialize,
{
    match result {
        Ok(view) => Enveloped {
            data: Some(view),
            error: None,
            updated_at: Some(Utc::now()),
        },
        Err(e) => {
            log::error!("{}", e);
            Enveloped {
                data: None,
                error: Some(e.to_string()),
                updated_at: None,
            }
        }
    }
}

#[get("/ok")]
async fn ok() -> BoardResult<impl Responder> {
    Ok(HttpResponse::Ok().finish())
}

#[get("/board/transport/{widget_id}")]
async fn get_transport(
    params: web::Path<(String,)>,
    ctx: web::Data<ContextData>,
) -> BoardResult<impl Responder> {
    let (widget_id,) = params.into_inner();
    let widget =
        config::widget(&widget_id).ok_or_else(|| BoardError::UnknownWidget(widget_id.clone()))?;
    let cell = ctx
        .state
        .transport_cell(widget.id)
        .ok_or(BoardError::UnknownWidget(widget_id))?;

    let snapshot = cell.snapshot().await;
    let now = Utc::now();
    let view = snapshot
        .data
        .as_ref()
        .map(|visits| departures::board_view(&ctx.normalizer, widget, visits, now));
    Ok(envelope(&snapshot, view))
}

#[get("/board/alerts/{widget_id}")]
async fn get_alerts(
    params: web::Path<(String,)>,
    ctx: web::Data<ContextData>,
) -> BoardResult<impl Responder> {
    let (widget_id,) = params.into_inner();
    let widget =
        config::widget(&widget_id).ok_or_else(|| BoardError::UnknownWidget(widget_id.clone()))?;
    let line_ref = widget.line_ref.ok_or(BoardError::NoLine(widget_id))?;

    let result = ctx
        .client
        .general_message(line_ref)
        .await
        .map(|response| alerts::extract_messages(&response));
    Ok(web::Json(live_envelope(result)))
}

#[get("/board/itineraries")]
async fn get_itineraries(ctx: web::Data<ContextData>) -> BoardResult<impl Responder> {
    let bus_cell = ctx
        .state
        .transport_cell("bus-77-hippodrome")
        .ok_or_else(|| BoardError::UnknownWidget("bus-77-hippodrome".to_string()))?;
    let rer_cell = ctx
        .state
        .transport_cell("rer-a")
        .ok_or_else(|| BoardError::UnknownWidget("rer-a".to_string()))?;
    let (bus, rer) = futures_util::join!(bus_cell.snapshot(), rer_cell.snapshot());

    let now = Utc::now();
    let routes = ctx.planner.estimate_routes(
        &ctx.normalizer,
        bus.data.as_deref().map(Vec::as_slice),
        rer.data.as_deref().map(Vec::as_slice),
        now,
    );

    // The staler of the two feeds bounds the freshness of the estimate.
    let updated_at = match (bus.updated_at, rer.updated_at) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    Ok(web::Json(Enveloped {
        data: Some(routes),
        error: bus.error.or(rer.error),
        updated_at,
    }))
}

#[derive(Serialize)]
struct JourneyCall {
    stop: String,
    aimed: Option<String>,
    expected: Option<String>,
}

fn local_time(timestamp: Option<&str>) -> Option<String> {
    timestamp
        .and_then(parse_time)
        .map(|t| t.with_timezone(&Paris).format("%H:%M").to_string())
}

#[get("/board/journeys/{journey_ref}")]
async fn get_journey(
    params: web::Path<(String,)>,
    ctx: web::Data<ContextData>,
) -> BoardResult<impl Responder> {
    let (journey_ref,) = params.into_inner();

    let result = ctx.client.vehicle_journey(&journey_ref).await.map(|response| {
        response
            .journey_calls()
            .iter()
            .filter_map(|call| {
                let stop = call
                    .stop_point_name
                    .as_ref()
                    .and_then(|names| names.first())
                    .map(|v| v.value.trim().to_string())
                    .filter(|v| !v.is_empty())?;
                Some(JourneyCall {
                    stop,
                    aimed: local_time(call.aimed_arrival_time.as_deref()),
                    expected: local_time(call.expected_arrival_time.as_deref()),
                })
            })
            .collect::<Vec<JourneyCall>>()
    });
    Ok(web::Json(live_envelope(result)))
}

#[get("/board/velib")]
async fn get_velib(ctx: web::Data<ContextData>) -> BoardResult<impl Responder> {
    let snapshot = ctx.state.velib.snapshot().await;
    let view = snapshot
        .data
        .as_ref()
        .map(|stations| sources::velib::station_views(stations));
    Ok(envelope(&snapshot, view))
}

#[get("/board/weather")]
async fn get_weather(ctx: web::Data<ContextData>) -> BoardResult<impl Responder> {
    let snapshot = ctx.state.weather.snapshot().await;
    let view = snapshot
        .data
        .as_ref()
        .and_then(|response| sources::weather::view(response));
    Ok(envelope(&snapshot, view))
}

#[get("/board/races")]
async fn get_races(ctx: web::Data<ContextData>) -> BoardResult<impl Responder> {
    let snapshot = ctx.state.races.snapshot().await;
    let now = Utc::now();
    let view = snapshot
        .data
        .as_ref()
        .and_then(|response| sources::races::view(response, now));
    Ok(envelope(&snapshot, view))
}

#[get("/board/roadworks")]
async fn get_roadworks(ctx: web::Data<ContextData>) -> BoardResult<impl Responder> {
    let snapshot = ctx.state.roadworks.snapshot().await;
    let view = snapshot.data.as_ref().map(|events| events.as_slice().to_vec());
    Ok(envelope(&snapshot, view))
}

#[get("/board/news")]
async fn get_news(ctx: web::Data<ContextData>) -> BoardResult<impl Responder> {
    let snapshot = ctx.state.news.snapshot().await;
    let view = snapshot.data.as_ref().map(|items| items.as_slice().to_vec());
    Ok(envelope(&snapshot, view))
}

fn spawn_pollers(ctx: &ContextData, token: &CancellationToken) {
    for widget in config::TRANSPORT_WIDGETS {
        // Cells exist for every configured widget.
        let Some(cell) = ctx.state.transport_cell(widget.id) else {
            continue;
        };
        let client = ctx.client.clone();
        state::spawn_poller(
            widget.id,
            config::refresh::TRANSPORT,
            token.child_token(),
            cell,
            move || {
                let client = client.clone();
                async move { prim::fetch_widget_visits(&client, widget).await }
            },
        );
    }

    let client = ctx.client.clone();
    state::spawn_poller(
        "velib",
        config::refresh::VELIB,
        token.child_token(),
        ctx.state.velib.clone(),
        move || {
            let client = client.clone();
            async move { sources::velib::fetch(&client).await }
        },
    );

    let client = ctx.client.clone();
    state::spawn_poller(
        "weather",
        config::refresh::WEATHER,
        token.child_token(),
        ctx.state.weather.clone(),
        move || {
            let client = client.clone();
            async move { sources::weather::fetch(&client).await }
        },
    );

    let client = ctx.client.clone();
    state::spawn_poller(
        "races",
        config::refresh::RACES,
        token.child_token(),
        ctx.state.races.clone(),
        move || {
            let client = client.clone();
            async move { sources::races::fetch(&client).await }
        },
    );

    let client = ctx.client.clone();
    state::spawn_poller(
        "roadworks",
        config::refresh::ROADWORKS,
        token.child_token(),
        ctx.state.roadworks.clone(),
        move || {
            let client = client.clone();
            async move { sources::roadworks::fetch(&client).await }
        },
    );

    let client = ctx.client.clone();
    let feed_parser = Arc::new(sources::news::FeedParser::new());
    state::spawn_poller(
        "news",
        config::refresh::NEWS,
        token.child_token(),
        ctx.state.news.clone(),
        move || {
            let client = client.clone();
            let parser = feed_parser.clone();
            async move { sources::news::fetch(&client, &parser).await }
        },
    );
}


#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::try_init().ok();

    log::debug!("Debug logging enabled");

    dotenvy::from_filename(".env").ok();

    let proxy_url = env::var("PROXY_URL").unwrap_or(config::DEFAULT_PROXY_URL.to_string());
    let client = PrimClient::new(&proxy_url)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let ctx = ContextData {
        client,
        state: Arc::new(BoardState::new()),
        normalizer: Arc::new(Normalizer::new()),
        planner: Arc::new(RoutePlanner::new()),
    };

    let token = CancellationToken::new();
    spawn_pollers(&ctx, &token);

    let listen_address = env::var("LISTEN_ADDRESS").unwrap_or("127.0.0.1:8080".to_string());

    log::info!("Starting server at {}", listen_address);

    let server = HttpServer::new(move || {
        let logger = Logger::default();

        let mut cors = actix_cors::Cors::default()
            .allowed_methods(vec!["GET"])
            .allowed_headers(vec!["accept"]);

        if let Ok(allowed_origin) = env::var("ALLOW_ORIGIN") {
            if allowed_origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(&allowed_origin);
            }
        }

        App::new()
            .wrap(logger)
            .wrap(cors)
            .app_data(web::Data::new(ctx.clone()))
            .service(ok)
            .service(get_transport)
            .service(get_alerts)
            .service(get_itineraries)
            .service(get_journey)
            .service(get_velib)
            .service(get_weather)
            .service(get_races)
            .service(get_roadworks)
            .service(get_news)
    })
    .bind(listen_address)?
    .run();

    select! {
        res = server => {
            log::info!("Server stopped");
            token.cancel();
            res?;
        }
        _ = token.cancelled() => {
            log::info!("Shutdown requested");
        }
    }

    Ok(())
}
