use criterion::{black_box, criterion_group, criterion_main, Criterion};
use r2lab_monitor::history::HistoryStore;
use r2lab_monitor::info_table::{FieldOverlay, InfoTable, WlanDirection};
use r2lab_monitor::stages::shell::release;
use r2lab_monitor::util;

const SHELL_OUTPUT: &str = "DISTRIB_RELEASE=14.10\nGNURADIO:3.7.5\n\
==> /sys/class/net/wlan0/statistics/rx_bytes <==\n1234567\n\
==> /sys/class/net/wlan0/statistics/tx_bytes <==\n89012\n\
==> /sys/class/net/wlan1/statistics/rx_bytes <==\n345678\n";

fn bench_release_parse(c: &mut Criterion) {
    c.bench_function("shell::release::parse", |b| {
        b.iter(|| black_box(release::parse(black_box(SHELL_OUTPUT))))
    });
}

fn bench_history_sample(c: &mut Criterion) {
    c.bench_function("history::sample_existing_key", |b| {
        let mut history = HistoryStore::new();
        history.sample((5, 0, WlanDirection::Rx), 1000, 0.0);
        let mut now = 1.0;
        b.iter(|| {
            let sample = history.sample(black_box((5, 0, WlanDirection::Rx)), black_box(1000 + now as u64 * 8000), now);
            now += 1.0;
            black_box(sample.rate_bps);
        })
    });
}

fn bench_summary_mask(c: &mut Criterion) {
    let mut table = InfoTable::new();
    for id in 1..=37 {
        table.insert_or_refine(
            id,
            &[FieldOverlay::cmc("on"), FieldOverlay::padding_shell_ok(), FieldOverlay::os_release("ubuntu-14.10")],
        );
    }

    c.bench_function("util::build_summary_mask_no_width", |b| {
        b.iter(|| black_box(util::build_summary_mask(table.iter(), None)))
    });

    c.bench_function("util::build_summary_mask_padded", |b| {
        b.iter(|| black_box(util::build_summary_mask(table.iter(), Some(64))))
    });
}

criterion_group!(benches, bench_release_parse, bench_history_sample, bench_summary_mask);
criterion_main!(benches);
