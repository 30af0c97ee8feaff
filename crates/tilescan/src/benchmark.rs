use crate::{Scan, ScanError, reference_exclusive_scan};
use core::fmt::Display;
use core::cell::RefCell;
use rand::{Rng, SeedableRng, rngs::StdRng};
use tilescan_runtime::{client::ComputeClient, server::ComputeServer};
use web_time::{Duration, Instant};

/// Durations of every sample of a benchmark.
#[derive(new, Debug, Clone, PartialEq)]
pub struct BenchmarkDurations {
    /// Number of items processed by a single sample.
    pub items: usize,
    /// Duration of each sample.
    pub durations: Vec<Duration>,
}

/// Statistics over the samples of a benchmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkComputations {
    /// Mean duration.
    pub mean: Duration,
    /// Median duration.
    pub median: Duration,
    /// Fastest sample.
    pub min: Duration,
    /// Slowest sample.
    pub max: Duration,
    /// Items processed per second, from the median.
    pub throughput: f64,
}

impl BenchmarkComputations {
    /// Computes the statistics, `None` without any sample.
    pub fn new(durations: &BenchmarkDurations) -> Option<Self> {
        let mut sorted = durations.durations.clone();
        sorted.sort();

        let min = *sorted.first()?;
        let max = *sorted.last()?;
        let median = sorted[sorted.len() / 2];
        let mean = sorted.iter().sum::<Duration>() / sorted.len() as u32;
        let throughput = match median.as_secs_f64() {
            secs if secs > 0.0 => durations.items as f64 / secs,
            _ => f64::INFINITY,
        };

        Some(Self {
            mean,
            median,
            min,
            max,
            throughput,
        })
    }
}

impl Display for BenchmarkDurations {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let computed = match BenchmarkComputations::new(self) {
            Some(computed) => computed,
            None => return f.write_str("No sample"),
        };

        write!(
            f,
            "
―――――――― Result ―――――――――
  Samples     {}
  Mean        {:.3?}
  Median      {:.3?}
  Min         {:.3?}
  Max         {:.3?}
  Throughput  {:.3e} items/s
―――――――――――――――――――――――――",
            self.durations.len(),
            computed.mean,
            computed.median,
            computed.min,
            computed.max,
            computed.throughput,
        )
    }
}

/// A workload timed over several samples.
pub trait Benchmark {
    /// Inputs of a single sample, prepared outside of the timed section.
    type Args;

    /// Prepares the inputs of a sample.
    fn prepare(&self) -> Self::Args;

    /// Executes a sample.
    fn execute(&self, args: Self::Args);

    /// Number of items processed by a sample.
    fn items(&self) -> usize;

    /// Name of the benchmark.
    fn name(&self) -> String;

    /// Waits for the device to be idle.
    fn sync(&self);

    /// Number of samples.
    fn num_samples(&self) -> usize {
        10
    }

    /// Runs a warmup then times every sample.
    fn run(&self) -> BenchmarkDurations {
        self.execute(self.prepare());
        self.sync();

        let durations = (0..self.num_samples())
            .map(|_| {
                let args = self.prepare();
                self.sync();
                let start = Instant::now();
                self.execute(args);
                self.sync();
                start.elapsed()
            })
            .collect();

        BenchmarkDurations::new(self.items(), durations)
    }
}

/// Times [Scan] on random sequences and validates every result against
/// [the host reference](reference_exclusive_scan).
#[derive(Debug)]
pub struct ScanBench<S: ComputeServer> {
    client: ComputeClient<S>,
    scan: RefCell<Scan<S>>,
    len: usize,
    tile_size: u32,
    seed: u64,
}

impl<S: ComputeServer> ScanBench<S> {
    /// Compiles the scan for a sequence of `len` elements in tiles of `tile_size`.
    pub fn new(
        client: &ComputeClient<S>,
        len: usize,
        tile_size: u32,
        seed: u64,
    ) -> Result<Self, ScanError> {
        Ok(Self {
            client: client.clone(),
            scan: RefCell::new(Scan::new(client)?),
            len,
            tile_size,
            seed,
        })
    }

    /// A random sequence of small values, the same for a given seed.
    pub fn input(&self) -> Vec<i32> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        (0..self.len).map(|_| rng.random_range(-100..=100)).collect()
    }
}

impl<S: ComputeServer> Benchmark for ScanBench<S> {
    type Args = (Vec<i32>, Vec<i32>);

    fn prepare(&self) -> Self::Args {
        let input = self.input();
        let expected = reference_exclusive_scan(&input);

        (input, expected)
    }

    fn execute(&self, (input, expected): Self::Args) {
        match self.scan.borrow_mut().run(&input, self.tile_size) {
            Ok(output) => assert_eq!(
                output, expected,
                "Scan of {} elements in tiles of {} doesn't match the reference",
                self.len, self.tile_size
            ),
            Err(err) => panic!("Scan failed: {err}"),
        }
    }

    fn items(&self) -> usize {
        self.len
    }

    fn name(&self) -> String {
        format!(
            "scan-{}-n{}-t{}",
            self.client.properties().name,
            self.len,
            self.tile_size
        )
    }

    fn sync(&self) {
        if let Err(err) = self.client.sync() {
            log::warn!("Can't synchronize the device: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host_client;

    #[test]
    fn computations_over_samples() {
        let durations = BenchmarkDurations::new(
            1000,
            [4, 1, 3, 2]
                .into_iter()
                .map(Duration::from_millis)
                .collect(),
        );

        let computed = BenchmarkComputations::new(&durations).unwrap();

        assert_eq!(computed.min, Duration::from_millis(1));
        assert_eq!(computed.max, Duration::from_millis(4));
        assert_eq!(computed.median, Duration::from_millis(3));
        assert_eq!(computed.mean, Duration::from_micros(2500));
        assert!((computed.throughput - 1000.0 / 0.003).abs() < 1e-6);
    }

    #[test]
    fn no_sample_has_no_computation() {
        let durations = BenchmarkDurations::new(10, Vec::new());

        assert!(BenchmarkComputations::new(&durations).is_none());
        assert_eq!(durations.to_string(), "No sample");
    }

    #[test_log::test]
    fn scan_bench_validates_every_sample() {
        let client = host_client();
        let bench = ScanBench::new(&client, 300, 32, 7).unwrap();

        assert_eq!(bench.input(), bench.input());

        let durations = bench.run();

        assert_eq!(durations.durations.len(), bench.num_samples());
        assert_eq!(durations.items, 300);
        assert!(bench.name().starts_with("scan-host-n300-t32"));
    }
}
