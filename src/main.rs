//! Sift 演示程序
//!
//! 入口：初始化日志、加载配置，用内存目录作为执行器跑一段脚本化的搜索会话，
//! 其中包含两次重叠的 fire，演示旧请求被取代。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures_util::future::join;
use serde_json::{json, Map, Value};
use sift::config::load_config;
use sift::fetch::{MemoryLocation, Pagination};
use sift::{
    executor_fn, observability, FilterMethod, SearchError, SearchRequest, SearchResponse, SessionBuilder,
};

fn catalogue() -> Vec<Value> {
    vec![
        json!({"id": 1, "title": "Metropolis", "genre": "drama", "year_of_production": 1927}),
        json!({"id": 2, "title": "Casablanca", "genre": "drama", "year_of_production": 1942}),
        json!({"id": 3, "title": "Playtime", "genre": "comedy", "year_of_production": 1967}),
        json!({"id": 4, "title": "Stalker", "genre": "drama", "year_of_production": 1979}),
        json!({"id": 5, "title": "Brazil", "genre": "comedy", "year_of_production": 1985}),
    ]
}

/// 仅支持演示所需的 q / eq / range
fn record_matches(record: &Value, filter: &[Value]) -> bool {
    let (Some(attribute), Some(method)) = (
        filter.first().and_then(Value::as_str),
        filter.get(1).and_then(Value::as_str),
    ) else {
        return true;
    };
    match method {
        "q" => filter.get(2).and_then(Value::as_str).map_or(true, |q| {
            record["title"]
                .as_str()
                .is_some_and(|t| t.to_lowercase().contains(&q.to_lowercase()))
        }),
        "eq" => filter.get(2).map_or(true, |v| &record[attribute] == v),
        "range" => {
            let n = record[attribute].as_f64().unwrap_or(f64::NAN);
            let low = filter.get(2).and_then(Value::as_f64).unwrap_or(f64::MIN);
            let high = filter.get(3).and_then(Value::as_f64).unwrap_or(f64::MAX);
            n >= low && n <= high
        }
        _ => true,
    }
}

async fn search(request: SearchRequest) -> Result<SearchResponse, String> {
    let delay = request.params.get("delay_ms").and_then(Value::as_u64).unwrap_or(10);
    tokio::time::sleep(Duration::from_millis(delay)).await;

    let filters = request.body["search"]["filters"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let objects: Vec<Value> = catalogue()
        .into_iter()
        .filter(|record| {
            filters
                .iter()
                .filter_map(Value::as_array)
                .all(|f| record_matches(record, f))
        })
        .collect();

    let mut by_genre = Map::new();
    for object in &objects {
        let genre = object["genre"].as_str().unwrap_or_default().to_string();
        let count = by_genre.get(&genre).and_then(Value::as_u64).unwrap_or(0);
        by_genre.insert(genre, json!(count + 1));
    }
    let mut aggregations = Map::new();
    aggregations.insert("count_by_genre".to_string(), Value::Object(by_genre));

    let total = objects.len() as u64;
    Ok(SearchResponse {
        objects,
        aggregations,
        pagination: Pagination {
            total_count: total,
            total_pages: u64::from(total > 0),
        },
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config = load_config(None).context("Failed to load config")?;
    let location = Arc::new(MemoryLocation::new());

    let (session, first) = SessionBuilder::new()
        .executor(executor_fn(search))
        .config(config)
        .stats(json!({"count_by": ["genre"]}))
        .serialize_to_url(location.clone())
        .init(|session| {
            session.set_persistent_filter("year_of_production", FilterMethod::Range, (1900, 2000));
        })
        .update(|snapshot| {
            tracing::debug!(
                "update: request {} running={} objects={}",
                snapshot.request_id,
                snapshot.running,
                snapshot.objects.len()
            );
        })
        .launch()
        .await
        .context("Failed to build session")?;
    let first = first.context("Initial search failed")?;
    println!("initial: {} objects", first.total_count);

    // 慢请求先发，快请求后发：只有后者的结果会被提交
    session.set_filter("genre", FilterMethod::Eq, "drama").set_params(json!({"delay_ms": 200}));
    let slow = session.fire();
    let fast = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session
            .set_filter("genre", FilterMethod::Eq, "comedy")
            .set_params(json!({"delay_ms": 10}));
        session.fire().await
    };
    let (slow, fast) = join(slow, fast).await;
    match slow {
        Err(e) if e.is_superseded() => println!("slow request: {e}"),
        other => println!("slow request: unexpected {other:?}"),
    }
    let fast = fast.context("Comedy search failed")?;
    println!("comedies: {:?}", fast.objects.iter().map(|o| &o["title"]).collect::<Vec<_>>());
    println!("genres: {}", session.get_aggregations("genre"));

    session.drop_filters(None, None).set_fixed_order([4, 2, 1]);
    match session.fire().await {
        Ok(snapshot) => println!(
            "fixed order: {:?}",
            snapshot.objects.iter().map(|o| &o["id"]).collect::<Vec<_>>()
        ),
        Err(SearchError::Superseded { .. }) => {}
        Err(e) => return Err(e).context("Fixed-order search failed"),
    }

    println!("location token: {}", location.get("p").unwrap_or_default());
    Ok(())
}
