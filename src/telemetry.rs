//! OpenTelemetry and tracing initialization.

use crate::config::Config;
use opentelemetry::global as otel_global;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{metrics::SdkMeterProvider, runtime, trace as sdktrace, Resource};
use tracing::{error, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_otel(cfg: &Config) -> Option<(SdkMeterProvider, sdktrace::Tracer, Meter)> {
    let endpoint = cfg.otel_endpoint.as_ref()?;
    info!(endpoint = %endpoint, "initializing OpenTelemetry exporter");

    let trace_exporter = opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint);
    let trace_config = sdktrace::config().with_resource(Resource::new(vec![
        opentelemetry::KeyValue::new("service.name", "r2lab-monitor"),
        opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
    ]));
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(trace_exporter)
        .with_trace_config(trace_config)
        .install_batch(runtime::TokioCurrentThread)
        .map_err(|e| error!(error = %e, "failed to initialize OTLP trace pipeline"))
        .ok()?;

    let metrics_exporter = opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint);
    let meter_provider = opentelemetry_otlp::new_pipeline()
        .metrics(runtime::TokioCurrentThread)
        .with_exporter(metrics_exporter)
        .build()
        .map_err(|e| error!(error = %e, "failed to initialize OTLP metrics pipeline"))
        .ok()?;

    otel_global::set_meter_provider(meter_provider.clone());
    let meter = otel_global::meter_provider().meter("r2lab-monitor");
    info!("OpenTelemetry exporter initialized");
    Some((meter_provider, tracer, meter))
}

/// Initializes the tracing subscriber (fmt layer + optional OTLP layer) and
/// returns the OTLP meter, if configured, for probe-outcome counters.
pub fn init_tracing(cfg: &Config) -> Option<Meter> {
    let writer = match &cfg.output {
        Some(path) => {
            if let Err(e) = std::fs::OpenOptions::new().create(true).append(true).open(path) {
                eprintln!("Warning: could not open '{path}' for append, falling back to stdout: {e}");
                BoxMakeWriter::new(std::io::stdout)
            } else {
                let path = path.clone();
                BoxMakeWriter::new(move || {
                    std::fs::OpenOptions::new().create(true).append(true).open(&path).expect("reopen log file")
                })
            }
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };
    let fmt_layer = fmt::layer().with_writer(writer).with_target(cfg.verbose).with_level(true);

    let filter = EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|e| {
        eprintln!("Warning: invalid RUST_LOG '{}': {e}", cfg.log_filter);
        EnvFilter::new("r2lab_monitor=info")
    });

    let registry_base = tracing_subscriber::registry().with(fmt_layer).with(filter);

    let otel_meter = if let Some((_provider, tracer, meter)) = init_otel(cfg) {
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry_base.with(otel_layer).init();
        Some(meter)
    } else {
        registry_base.init();
        None
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = option_env!("VERGEN_GIT_SHA_SHORT").unwrap_or("unknown"),
        build_ts = env!("VERGEN_BUILD_TIMESTAMP"),
        "r2lab-monitor starting"
    );

    info!(
        cycle = %crate::util::format_duration(cfg.cycle),
        runs = cfg.runs,
        sidecar_url = %cfg.sidecar_url,
        report_wlan = cfg.report_wlan,
        stats_json = cfg.stats_json,
        otel_endpoint = %cfg.otel_endpoint.as_deref().unwrap_or("<None>"),
        "configuration loaded"
    );

    otel_meter
}

/// Probe-outcome counters, created once per process from the optional
/// OTLP meter. A no-op when metrics export is disabled.
pub struct ProbeCounters {
    cmc_fail: Option<opentelemetry::metrics::Counter<u64>>,
    ssh_off: Option<opentelemetry::metrics::Counter<u64>>,
    ping_off: Option<opentelemetry::metrics::Counter<u64>>,
}

impl ProbeCounters {
    pub fn new(meter: Option<&Meter>) -> Self {
        ProbeCounters {
            cmc_fail: meter.map(|m| m.u64_counter("monitor.cmc_fail").with_description("CMC probes ending in fail").init()),
            ssh_off: meter.map(|m| m.u64_counter("monitor.ssh_off").with_description("Shell connects refused").init()),
            ping_off: meter.map(|m| m.u64_counter("monitor.ping_off").with_description("Control pings with no reply").init()),
        }
    }

    pub fn record_cmc_fail(&self) {
        if let Some(counter) = &self.cmc_fail {
            counter.add(1, &[]);
        }
    }

    pub fn record_ssh_off(&self) {
        if let Some(counter) = &self.ssh_off {
            counter.add(1, &[]);
        }
    }

    pub fn record_ping_off(&self) {
        if let Some(counter) = &self.ping_off {
            counter.add(1, &[]);
        }
    }
}
