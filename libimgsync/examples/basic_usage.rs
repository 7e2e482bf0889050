//! Basic usage example for the imgsync library.
//!
//! Pushes a local image to a registry and reads the digest back from the
//! registry's manifest endpoint.
//!
//! Run with: cargo run --example basic_usage -- alpine:3.10 localhost:5000/alpine:3.10

use libimgsync::{Cancellation, Config, Session};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let source = args.next().unwrap_or_else(|| "alpine:3.10".to_string());
    let target = args
        .next()
        .unwrap_or_else(|| "localhost:5000/alpine:3.10".to_string());

    println!("imgsync - Basic Usage Example\n");

    // Engine at IMGSYNC_HOST (default tcp://localhost:2375), plain-HTTP local registry
    let mut config = Config::load(None)?;
    config.insecure_registries.push("localhost:5000".to_string());
    let session = Session::from_config(&config)?;

    let state = match session.create(&source, &target, &Cancellation::new()) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("✗ Push failed: {}", e);
            eprintln!("  Make sure an engine is listening at {}", config.engine.host);
            eprintln!("  and a registry is running with: docker run -d -p 5000:5000 registry:2");
            return Ok(());
        }
    };
    println!("✓ Pushed {} as {}", state.source_name, state.target_name);
    if let Some(ref digest) = state.sha256_digest {
        println!("  push digest:     {}", digest);
    }

    let remote = session.read(&target)?;
    println!("  registry digest: {}", remote);

    if state.sha256_digest.as_ref() == Some(&remote) {
        println!("\n✓ Registry serves the pushed image");
    } else {
        println!("\n⚠ Registry serves a different image");
    }

    Ok(())
}
