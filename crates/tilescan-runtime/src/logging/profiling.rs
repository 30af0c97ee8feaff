use core::fmt::Display;
use hashbrown::HashMap;

/// Accumulated launch durations, keyed by kernel name.
#[derive(Debug, Default)]
pub struct Profiled {
    durations: HashMap<String, ProfileItem>,
}

#[derive(Debug, Default, Clone)]
struct ProfileItem {
    total_duration: core::time::Duration,
    num_computed: usize,
}

impl Profiled {
    /// If some computation was profiled.
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Adds a duration for the given name. Only the first line of the name is kept.
    pub fn update(&mut self, name: &str, duration: core::time::Duration) {
        let name = name.lines().next().unwrap_or(name);

        match self.durations.get_mut(name) {
            Some(item) => item.update(duration),
            None => {
                self.durations.insert(
                    name.to_string(),
                    ProfileItem {
                        total_duration: duration,
                        num_computed: 1,
                    },
                );
            }
        }
    }
}

impl Profiled {
    // Rows sorted by total duration, longest first.
    fn rows(&self) -> Vec<(&str, &ProfileItem)> {
        let mut rows: Vec<_> = self
            .durations
            .iter()
            .map(|(name, item)| (name.as_str(), item))
            .collect();
        rows.sort_by(|a, b| b.1.total_duration.cmp(&a.1.total_duration).then(a.0.cmp(b.0)));
        rows
    }
}

impl Display for Profiled {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let rows = self.rows();
        let total: core::time::Duration = rows.iter().map(|(_, item)| item.total_duration).sum();
        let launches: usize = rows.iter().map(|(_, item)| item.num_computed).sum();
        let width = rows
            .iter()
            .map(|(name, _)| name.len())
            .chain(["kernel".len()])
            .max()
            .unwrap_or_default();

        writeln!(
            f,
            "{:<width$}  {:>8}  {:>12}  {:>12}  {:>5}",
            "kernel", "launches", "total", "mean", "share"
        )?;

        for (name, item) in rows {
            let share = match total.as_nanos() {
                0 => 0.0,
                nanos => 100.0 * item.total_duration.as_nanos() as f64 / nanos as f64,
            };

            writeln!(
                f,
                "{name:<width$}  {:>8}  {:>12}  {:>12}  {share:>4.0}%",
                item.num_computed,
                format!("{:.1?}", item.total_duration),
                format!("{:.1?}", item.mean()),
            )?;
        }

        write!(
            f,
            "{:<width$}  {launches:>8}  {:>12}",
            "total",
            format!("{total:.1?}"),
        )
    }
}

impl ProfileItem {
    fn update(&mut self, duration: core::time::Duration) {
        self.total_duration += duration;
        self.num_computed += 1;
    }

    fn mean(&self) -> core::time::Duration {
        match self.num_computed {
            0 => core::time::Duration::ZERO,
            count => self.total_duration / count as u32,
        }
    }
}
