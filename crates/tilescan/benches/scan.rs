use tilescan::{
    benchmark::{Benchmark, BenchmarkComputations, ScanBench},
    host_client,
};

fn run(len: usize, tile_size: u32) {
    let client = host_client();
    let bench = match ScanBench::new(&client, len, tile_size, 42) {
        Ok(bench) => bench,
        Err(err) => panic!("Can't prepare {len} elements in tiles of {tile_size}: {err}"),
    };

    let durations = bench.run();
    println!("{}", bench.name());
    println!("{durations}");

    if let Some(computed) = BenchmarkComputations::new(&durations) {
        log::info!("{}: median {:?}", bench.name(), computed.median);
    }
}

fn main() {
    env_logger::init();

    for (len, tile_size) in [
        (1 << 10, 32),
        (1 << 14, 128),
        (1 << 16, 256),
        (1 << 18, 512),
        (1 << 20, 1024),
    ] {
        run(len, tile_size);
    }
}
