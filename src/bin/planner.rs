use std::path::PathBuf;

use day_planner::cache::Cache;
use day_planner::client::Client;
use day_planner::{parse_date_key, PlannerController};

const DEFAULT_CACHE_FILE: &str = "planner_cache.json";


/// Refresh one day (today by default, or the `YYYY-MM-DD` given as argument) from the server, and print it.
///
/// The server is given by `PLANNER_API_URL` and `PLANNER_TOKEN`, the cache file by `PLANNER_CACHE`.
#[tokio::main]
async fn main() {
    env_logger::init();

    let date = match std::env::args().nth(1) {
        None => chrono::Local::now().date_naive(),
        Some(arg) => match parse_date_key(&arg) {
            Ok(date) => date,
            Err(err) => {
                eprintln!("Invalid date {:?} ({}). Expected YYYY-MM-DD", arg, err);
                std::process::exit(2);
            },
        },
    };

    if let Ok(url) = std::env::var("PLANNER_API_URL") {
        *day_planner::config::API_BASE_URL.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = url;
    }
    let token = std::env::var("PLANNER_TOKEN").ok();
    let cache_path = std::env::var("PLANNER_CACHE").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_CACHE_FILE));

    let mut cache = match Cache::from_file(&cache_path) {
        Ok(cache) => cache,
        Err(err) => {
            log::warn!("Invalid cache file: {}. Using a default cache", err);
            Cache::new(&cache_path)
        }
    };

    let client = match Client::from_config(token) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Unable to create the API client: {}", err);
            std::process::exit(1);
        },
    };
    log::info!("Refreshing {} from {}", date, client.resource().url());
    let controller = PlannerController::new_with_index(client, cache.to_index());

    match controller.refresh_date(date).await {
        Err(err) => log::warn!("{}. Showing cached tasks", err),
        Ok(()) => cache.update_last_sync(None),
    }

    println!("---- {} -----", date);
    for task in controller.tasks_on(&date) {
        let urgency = if task.is_urgent() { "!" } else { " " };
        println!("    {} {}\t{}", urgency, task.content(), task.id());
    }

    cache.store(&controller.index_snapshot());
    if let Err(err) = cache.save_to_file() {
        log::warn!("Unable to save the cache: {}", err);
    }
}
