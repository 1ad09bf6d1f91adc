use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};

use stayline::context::RequestContext;
use stayline::coordinator::{BookingCoordinator, RetryPolicy};
use stayline::model::*;
use stayline::store::Store;

type Coordinator = BookingCoordinator<Store, Store>;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
}

fn day(offset: u64) -> NaiveDate {
    base_date() + Days::new(offset)
}

fn request(property_id: PropertyId, start: u64, nights: u64) -> BookingRequest {
    BookingRequest {
        property_id,
        customer_name: "bench".into(),
        start_date: day(start),
        end_date: day(start + nights),
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().map_or(0.0, |d| d.as_secs_f64() * 1000.0),
    );
}

async fn setup(store: &Store, n_properties: i64) {
    for id in 1..=n_properties {
        store
            .register_property(Property {
                id,
                nightly_rate: 40.0 + id as f64,
                city: format!("city-{}", id % 5),
                country: "Portugal".into(),
                bedrooms: (id % 4) as u32 + 1,
                guests: (id % 4) as u32 * 2 + 2,
            })
            .await
            .unwrap();
    }
    println!("  registered {n_properties} properties");
}

async fn phase1_sequential(coordinator: &Coordinator) {
    let n = 2000u64;
    let ctx = RequestContext::background();
    let mut latencies = Vec::with_capacity(n as usize);
    let start = Instant::now();

    for i in 0..n {
        let t = Instant::now();
        coordinator
            .book_property(&ctx, request(1, i * 2, 2))
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("book latency", &mut latencies);
}

async fn phase2_disjoint(coordinator: Arc<Coordinator>, n_properties: i64) {
    let n_tasks = n_properties as usize;
    let n_per_task = 200u64;
    let start = Instant::now();
    let mut handles = Vec::new();

    for i in 0..n_tasks {
        let coordinator = coordinator.clone();
        // Property 1 is already full from phase 1
        let property_id = 2 + (i as i64 % (n_properties - 1));
        let offset = 10_000 + (i as u64) * n_per_task * 3;
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::background();
            for j in 0..n_per_task {
                coordinator
                    .book_property(&ctx, request(property_id, offset + j * 3, 2))
                    .await
                    .unwrap();
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    let elapsed = start.elapsed();
    let total = n_tasks as u64 * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_contended(coordinator: Arc<Coordinator>, property_id: PropertyId) {
    let rounds = 100u64;
    let contenders = 16;
    let mut winner_latencies = Vec::new();
    let mut loser_latencies = Vec::new();
    let mut double_booked = 0;

    for round in 0..rounds {
        let mut handles = Vec::new();
        for c in 0..contenders {
            let coordinator = coordinator.clone();
            // Staggered stays all covering the round's middle night
            let start = 50_000 + round * 10 + (c % 3);
            let nights = 3 - (c % 3);
            handles.push(tokio::spawn(async move {
                let t = Instant::now();
                let result = coordinator
                    .book_property(&RequestContext::background(), request(property_id, start, nights))
                    .await;
                (result.is_ok(), t.elapsed())
            }));
        }
        let mut winners = 0;
        for h in handles {
            let (won, latency) = h.await.unwrap();
            if won {
                winners += 1;
                winner_latencies.push(latency);
            } else {
                loser_latencies.push(latency);
            }
        }
        if winners != 1 {
            double_booked += 1;
        }
    }

    println!("  {rounds} rounds x {contenders} contenders, rounds without exactly one winner: {double_booked}");
    print_latency("winner latency", &mut winner_latencies);
    print_latency("loser latency", &mut loser_latencies);
}

async fn phase4_read_under_load(coordinator: Arc<Coordinator>, property_id: PropertyId) {
    let writer = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            let ctx = RequestContext::background();
            for i in 0..1000u64 {
                let _ = coordinator
                    .book_property(&ctx, request(property_id, 80_000 + i * 2, 1))
                    .await;
            }
        })
    };

    let ctx = RequestContext::background();
    let mut latencies = Vec::with_capacity(2000);
    for i in 0..2000u64 {
        let range = DateRange::new(day(80_000 + i), day(80_000 + i + 7));
        let t = Instant::now();
        coordinator
            .get_availability(&ctx, property_id, range)
            .await
            .unwrap();
        latencies.push(t.elapsed());
    }
    writer.await.unwrap();
    print_latency("availability latency", &mut latencies);
}

#[tokio::main]
async fn main() {
    let durable = std::env::var("STAYLINE_BENCH_DURABLE").is_ok_and(|v| v == "1");
    let n_properties = 10;

    println!("=== stayline stress benchmark ===");
    let store = if durable {
        let dir = std::env::temp_dir().join(format!("stayline_bench_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        println!("storage: {}\n", dir.display());
        Store::open(dir.join("bench.wal")).unwrap()
    } else {
        println!("storage: in-memory\n");
        Store::in_memory()
    };

    let coordinator = Arc::new(BookingCoordinator::with_policy(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        RetryPolicy::default(),
    ));

    println!("[setup]");
    setup(&store, n_properties).await;

    println!("\n[phase 1] sequential booking throughput");
    phase1_sequential(&coordinator).await;

    println!("\n[phase 2] concurrent disjoint bookings");
    phase2_disjoint(coordinator.clone(), n_properties).await;

    println!("\n[phase 3] contended bookings on one property");
    phase3_contended(coordinator.clone(), n_properties).await;

    println!("\n[phase 4] availability latency under write load");
    phase4_read_under_load(coordinator.clone(), 2).await;

    println!(
        "\n{} properties, {} active bookings",
        store.property_count(),
        store.active_booking_count()
    );
    println!("=== benchmark complete ===");
}
