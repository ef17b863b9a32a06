//! YAML run-configuration loading.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{bail, Context};
use chrono::{FixedOffset, Local, NaiveDateTime, TimeZone};
use dropwatch_core::RunConfig;
use serde::Deserialize;

/// On-disk configuration: the core run configuration plus the scheduling
/// fields the worker does not own.
#[derive(Debug, Deserialize)]
struct FileConfig {
    /// "YYYY-mm-dd HH:MM:SS", interpreted in `utc_offset` or local time.
    #[serde(default)]
    drop_time: Option<String>,
    /// Fixed offset like "+09:00"; local time when absent.
    #[serde(default)]
    utc_offset: Option<String>,
    #[serde(flatten)]
    run: RunConfig,
}

pub struct LoadedConfig {
    pub run: RunConfig,
    drop_time: Option<String>,
    utc_offset: Option<String>,
}

pub fn load(path: &Path) -> anyhow::Result<LoadedConfig> {
    let text = fs::read_to_string(path)?;
    let file: FileConfig = serde_yaml::from_str(&text)?;
    Ok(LoadedConfig {
        run: file.run.normalized(),
        drop_time: file.drop_time,
        utc_offset: file.utc_offset,
    })
}

impl LoadedConfig {
    /// The configured drop instant as wall-clock time.
    pub fn drop_time(&self) -> anyhow::Result<SystemTime> {
        let Some(raw) = &self.drop_time else {
            bail!("config has no drop_time; pass --now to fire immediately");
        };
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
            .with_context(|| format!("unparsable drop_time {raw:?}"))?;
        let instant = match &self.utc_offset {
            Some(offset) => {
                let offset = parse_offset(offset)?;
                naive
                    .and_local_timezone(offset)
                    .single()
                    .context("drop_time not representable in the configured offset")?
                    .into()
            }
            None => Local
                .from_local_datetime(&naive)
                .single()
                .context("ambiguous local drop_time (DST transition?)")?
                .into(),
        };
        Ok(instant)
    }
}

fn parse_offset(raw: &str) -> anyhow::Result<FixedOffset> {
    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().with_context(|| format!("bad offset {raw:?}"))?;
    let minutes: i32 = minutes
        .parse()
        .with_context(|| format!("bad offset {raw:?}"))?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .with_context(|| format!("offset out of range: {raw:?}"))
}
