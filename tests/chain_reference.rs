//! End-to-end chain scenarios over synthetic samples, driven through the
//! library API and the output writers.

use std::fs;
use std::time::Duration;

use pfdeconv::data::SampleData;
use pfdeconv::io::output::{OutputWriter, RunMetadata};
use pfdeconv::io::table::PanelTable;
use pfdeconv::model::mcmc::{McmcEngine, McmcSettings, McmcTrace};
use pfdeconv::model::panel::Panel;

/// Build a sample over two chromosomes with the given per-locus counts.
fn synthetic_data(ref_counts: Vec<f64>, alt_counts: Vec<f64>, plaf: f64) -> SampleData {
    let n = ref_counts.len();
    let split = n / 2;
    let positions = |len: usize| (0..len as u64).map(|t| 1000 * (t + 1)).collect::<Vec<_>>();

    let (chrom, positions) = if split == 0 {
        (vec!["Pf3D7_01_v3".to_string()], vec![positions(n)])
    } else {
        (
            vec!["Pf3D7_01_v3".to_string(), "Pf3D7_02_v3".to_string()],
            vec![positions(split), positions(n - split)],
        )
    };

    SampleData::from_parts(chrom, positions, ref_counts, alt_counts, vec![plaf; n])
        .unwrap()
}

/// Deterministic 0/1 panel aligned to the sample's loci.
fn synthetic_panel(data: &SampleData, n_haps: usize, pattern: &dyn Fn(usize, usize) -> u8) -> Panel {
    let mut chrom = Vec::new();
    let mut pos = Vec::new();
    for (c, p) in data.loci() {
        chrom.push(c.to_string());
        pos.push(p);
    }
    let bits: Vec<Vec<u8>> = (0..data.n_loci())
        .map(|i| (0..n_haps).map(|h| pattern(i, h)).collect())
        .collect();

    Panel::from_table(PanelTable { chrom, pos, bits }, data).unwrap()
}

fn run_chain(
    data: &SampleData,
    panel: Option<&Panel>,
    k: usize,
    n_sample: usize,
    rate: usize,
    seed: u64,
) -> McmcTrace {
    let settings = McmcSettings::new(k, n_sample, rate, seed);
    McmcEngine::new(data, panel, settings).unwrap().run().unwrap()
}

fn write_outputs(prefix: &str, data: &SampleData, trace: &McmcTrace, settings: &McmcSettings) {
    let writer = OutputWriter::new(prefix, 8);
    writer.remove_stale();
    let meta = RunMetadata {
        version: "test".to_string(),
        seed: settings.seed,
        k_strain: settings.k_strain,
        n_sample: settings.n_sample,
        rate: settings.rate,
        burnin: settings.burnin,
        wall_time: Duration::from_secs(0),
    };
    writer.write_all(data, trace, &meta).unwrap();
}

#[test]
fn pure_reference_sample_settles_on_zero_haplotype() {
    // K = 1, no panel, every read supports the reference allele.
    let data = synthetic_data(vec![100.0; 10], vec![0.0; 10], 0.5);
    let trace = run_chain(&data, None, 1, 200, 2, 101);

    assert!(trace.proportions.iter().all(|row| row == &vec![1.0]));
    assert!(trace.final_haplotypes.iter().all(|row| row == &vec![0u8]));
}

#[test]
fn pure_alternative_sample_settles_on_one_haplotype() {
    let data = synthetic_data(vec![0.0; 10], vec![100.0; 10], 0.5);
    let trace = run_chain(&data, None, 1, 200, 2, 101);

    assert!(trace.final_haplotypes.iter().all(|row| row == &vec![1u8]));
}

#[test]
fn fixed_seed_reproduces_output_files_byte_for_byte() {
    // K = 3, panel of 10, 500 loci, seed 42: two runs must write
    // identical .llk, .hap and .prop files.
    let n = 500;
    let n_haps = 10;
    let pattern = |i: usize, h: usize| ((i * (h + 3) + h * h) % 7 < 3) as u8;

    // Mix three of the panel haplotypes at fixed proportions.
    let truth = [(0usize, 0.2), (3usize, 0.3), (7usize, 0.5)];
    let depth = 100.0;
    let mut ref_counts = Vec::with_capacity(n);
    let mut alt_counts = Vec::with_capacity(n);
    for i in 0..n {
        let w: f64 = truth
            .iter()
            .map(|&(h, p)| p * pattern(i, h) as f64)
            .sum();
        let alt = (depth * w).round();
        alt_counts.push(alt);
        ref_counts.push(depth - alt);
    }
    let data = synthetic_data(ref_counts, alt_counts, 0.5);
    let panel = synthetic_panel(&data, n_haps, &pattern);

    let settings = McmcSettings::new(3, 40, 2, 42);
    let tmp = std::env::temp_dir();
    let prefix_a = tmp.join("pfdeconv_itest_a");
    let prefix_b = tmp.join("pfdeconv_itest_b");
    let prefix_a = prefix_a.to_str().unwrap();
    let prefix_b = prefix_b.to_str().unwrap();

    for prefix in [prefix_a, prefix_b] {
        let trace = run_chain(&data, Some(&panel), 3, 40, 2, 42);
        write_outputs(prefix, &data, &trace, &settings);
    }

    for ext in ["llk", "hap", "prop"] {
        let a = fs::read(format!("{}.{}", prefix_a, ext)).unwrap();
        let b = fs::read(format!("{}.{}", prefix_b, ext)).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b, ".{} files differ between same-seed runs", ext);
    }

    // Spot-check the written shapes while the files are around.
    let llk = fs::read_to_string(format!("{}.llk", prefix_a)).unwrap();
    assert_eq!(llk.lines().count(), 40);

    let prop = fs::read_to_string(format!("{}.prop", prefix_a)).unwrap();
    assert_eq!(prop.lines().count(), 40);
    for line in prop.lines() {
        let row: Vec<f64> = line
            .split_whitespace()
            .map(|f| f.parse().unwrap())
            .collect();
        assert_eq!(row.len(), 3);
        assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-6);
    }

    let hap = fs::read_to_string(format!("{}.hap", prefix_a)).unwrap();
    let mut lines = hap.lines();
    assert_eq!(lines.next().unwrap(), "CHROM\tPOS\th1\th2\th3");
    assert_eq!(lines.count(), n);

    for prefix in [prefix_a, prefix_b] {
        for ext in ["llk", "hap", "prop", "log"] {
            let _ = fs::remove_file(format!("{}.{}", prefix, ext));
        }
    }
}

#[test]
fn different_seeds_diverge() {
    let data = synthetic_data(vec![40.0; 20], vec![20.0; 20], 0.4);
    let panel = synthetic_panel(&data, 4, &|i, h| ((i + h) % 3 == 0) as u8);

    let a = run_chain(&data, Some(&panel), 2, 30, 2, 1);
    let b = run_chain(&data, Some(&panel), 2, 30, 2, 2);
    assert!(a.llk != b.llk || a.final_haplotypes != b.final_haplotypes);
}
