//! Throughput benchmark over a request trace file.
//!
//! Trace format: one request per line, `url[,source_host[,resource_type]]`.
//! Blank lines and `#` comments are ignored.

use std::fs;
use std::time::Instant;

use ws_engine::Engine;

struct TraceRequest {
    url: String,
    source_host: String,
    resource_type: String,
}

pub fn run(inputs: &[String], requests_path: &str, iterations: usize) -> Result<(), String> {
    let mut text = String::new();
    for path in inputs {
        let content =
            fs::read_to_string(path).map_err(|e| format!("failed to read '{path}': {e}"))?;
        text.push_str(&content);
        text.push('\n');
    }

    let build_start = Instant::now();
    let engine = Engine::from_filter_list(&text).map_err(|e| e.to_string())?;
    let build_time = build_start.elapsed();

    let requests = load_trace(requests_path)?;
    if requests.is_empty() {
        return Err(format!("no requests in '{requests_path}'"));
    }

    println!(
        "engine: {} rules, built in {:.1}ms; {} requests x {} iterations",
        engine.rule_count(),
        build_time.as_secs_f64() * 1000.0,
        requests.len(),
        iterations,
    );

    // Warmup pass, also used for the block-rate report.
    let mut blocked = 0usize;
    for req in &requests {
        let r = engine.match_request(&req.url, "", &req.source_host, false, &req.resource_type);
        if r.matched && !r.exception {
            blocked += 1;
        }
    }

    let start = Instant::now();
    for _ in 0..iterations {
        for req in &requests {
            std::hint::black_box(engine.match_request(
                &req.url,
                "",
                &req.source_host,
                false,
                &req.resource_type,
            ));
        }
    }
    let elapsed = start.elapsed();

    let total_ops = requests.len() * iterations;
    let per_op_us = elapsed.as_secs_f64() * 1e6 / total_ops as f64;
    println!(
        "{} matches in {:.1}ms ({:.2}us/request, {:.0} req/s), {}/{} blocked",
        total_ops,
        elapsed.as_secs_f64() * 1000.0,
        per_op_us,
        1e6 / per_op_us,
        blocked,
        requests.len(),
    );

    Ok(())
}

fn load_trace(path: &str) -> Result<Vec<TraceRequest>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("failed to read '{path}': {e}"))?;
    let mut requests = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split(',');
        let url = parts.next().unwrap_or_default().trim().to_string();
        if url.is_empty() {
            continue;
        }
        requests.push(TraceRequest {
            url,
            source_host: parts.next().unwrap_or("").trim().to_string(),
            resource_type: parts.next().unwrap_or("").trim().to_string(),
        });
    }

    Ok(requests)
}
