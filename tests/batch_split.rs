// tests/batch_split.rs
use chrono::{FixedOffset, NaiveTime, TimeZone};
use trend_radar::batch::{add_batch_headers, render_document, split_report, RenderContext};
use trend_radar::render::Dialect;
use trend_radar::report::{NewTitleSection, ReportData, ReportMode, TrendStat};
use trend_radar::scoring::ScoredTitle;
use trend_radar::update::UpdateInfo;

fn ctx() -> RenderContext {
    let tz = FixedOffset::east_opt(8 * 3600).unwrap();
    RenderContext {
        now: tz.with_ymd_and_hms(2025, 3, 1, 21, 5, 0).unwrap(),
        rank_threshold: 5,
        update: Some(UpdateInfo {
            current: "1.0.0".into(),
            remote: "1.1.0".into(),
        }),
    }
}

fn title(name: String, source: &str, rank: u32, new: bool) -> ScoredTitle {
    let t = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
    ScoredTitle {
        title: name,
        source_id: source.to_lowercase(),
        source_name: source.to_string(),
        span: Some((t, t)),
        count: 1,
        ranks: vec![rank],
        url: format!("https://news.example/{rank}"),
        mobile_url: String::new(),
        is_new: new,
        weight: 1.0,
    }
}

fn big_report() -> ReportData {
    let stats: Vec<TrendStat> = (1..=4)
        .map(|g| TrendStat {
            word: format!("Group{g}"),
            count: 12,
            position: g - 1,
            titles: (1..=12)
                .map(|n| title(format!("Headline-G{g}-N{n:02}-end"), "Weibo", n as u32, n % 3 == 0))
                .collect(),
            percentage: 25.0,
        })
        .collect();
    let new_titles = vec![
        NewTitleSection {
            source_id: "zhihu".into(),
            source_name: "Zhihu".into(),
            titles: (1..=9)
                .map(|n| title(format!("Fresh-Z{n}-end"), "Zhihu", n, true))
                .collect(),
        },
        NewTitleSection {
            source_id: "baidu".into(),
            source_name: "Baidu".into(),
            titles: (1..=4)
                .map(|n| title(format!("Fresh-B{n}-end"), "Baidu", n, true))
                .collect(),
        },
    ];
    ReportData {
        mode: ReportMode::Daily,
        stats,
        new_titles,
        failed_ids: vec!["toutiao".into(), "douyin".into()],
        total_new_count: 13,
    }
}

fn dialects() -> Vec<(&'static str, Dialect)> {
    vec![
        ("plain", Dialect::plain()),
        ("markdown", Dialect::markdown()),
        ("ntfy", Dialect::ntfy()),
        ("dingtalk", Dialect::dingtalk()),
        ("feishu", Dialect::feishu("━━━━━━━━")),
        ("telegram", Dialect::telegram()),
        ("slack", Dialect::slack()),
    ]
}

fn item_lines(text: &str) -> Vec<&str> {
    text.lines().filter(|l| l.starts_with("  ")).collect()
}

#[test]
fn every_batch_fits_its_budget() {
    let report = big_report();
    let ctx = ctx();
    for budget in [500usize, 900, 4000] {
        for (name, dialect) in dialects() {
            let batches = add_batch_headers(split_report(&report, &dialect, budget, &ctx), &dialect, budget);
            assert!(!batches.is_empty());
            for (i, b) in batches.iter().enumerate() {
                assert!(b.len() <= budget, "{name} budget {budget}: batch {i} has {} bytes", b.len());
            }
            if budget == 500 {
                assert!(batches.len() > 1, "{name} should split at 500 bytes");
            }
        }
    }
}

#[test]
fn items_appear_once_and_in_order() {
    let report = big_report();
    let ctx = ctx();
    for (name, dialect) in dialects() {
        let doc = render_document(&report, &dialect, &ctx);
        let expected = item_lines(&doc);
        assert_eq!(expected.len(), 4 * 12 + 13 + 2, "{name}");

        let batches = add_batch_headers(split_report(&report, &dialect, 700, &ctx), &dialect, 700);
        let got: Vec<&str> = batches.iter().flat_map(|b| item_lines(b)).collect();
        assert_eq!(got, expected, "{name}: concatenated items differ from the unsplit document");
    }
}

#[test]
fn headers_travel_with_their_first_item() {
    let report = big_report();
    let dialect = Dialect::plain();
    let batches = split_report(&report, &dialect, 450, &ctx());
    assert!(batches.len() > 2);

    for b in &batches {
        let lines: Vec<&str> = b.lines().filter(|l| !l.trim().is_empty()).collect();
        for (i, line) in lines.iter().enumerate() {
            let is_group_header = line.contains(" : ") && line.ends_with(" items");
            let is_source_header = line.ends_with("items):");
            if is_group_header || is_source_header {
                let next = lines.get(i + 1).copied().unwrap_or("");
                assert!(
                    next.starts_with("  1. ") || next.starts_with("  ") && next.contains(". "),
                    "header '{line}' not followed by an item in batch:\n{b}"
                );
            }
        }
    }
}

#[test]
fn new_section_never_shows_the_new_marker() {
    let report = big_report();
    let doc = render_document(&report, &Dialect::plain(), &ctx());
    let (_, new_part) = doc.split_once("New this crawl").unwrap();
    assert!(!new_part.contains("🆕 Fresh"));
    let (stats_part, _) = doc.split_once("New this crawl").unwrap();
    assert!(stats_part.contains("🆕 Headline-G1-N03-end"));
}

#[test]
fn labels_only_when_split() {
    let report = big_report();
    let dialect = Dialect::markdown();
    let single = add_batch_headers(split_report(&report, &dialect, 100_000, &ctx()), &dialect, 100_000);
    assert_eq!(single.len(), 1);
    assert!(!single[0].contains("[Batch"));

    let many = add_batch_headers(split_report(&report, &dialect, 800, &ctx()), &dialect, 800);
    let n = many.len();
    for (i, b) in many.iter().enumerate() {
        assert!(b.starts_with(&format!("**[Batch {}/{n}]**\n\n", i + 1)));
    }
}

#[test]
fn footer_and_update_notice_on_every_batch() {
    let report = big_report();
    let dialect = Dialect::slack();
    let batches = split_report(&report, &dialect, 900, &ctx());
    for b in &batches {
        assert!(b.contains("Update time: 2025-03-01 21:05:00"));
        assert!(b.contains("New version available *1.1.0*, current *1.0.0*"));
    }
}

#[test]
fn empty_report_gets_a_placeholder() {
    let ctx = RenderContext { update: None, ..ctx() };
    for (mode, text) in [
        (ReportMode::Daily, "No matching titles today"),
        (ReportMode::Current, "No matching titles in the current ranking"),
        (ReportMode::Incremental, "No new matching titles in this update"),
    ] {
        let batches = split_report(&ReportData::empty(mode), &Dialect::markdown(), 4000, &ctx);
        assert_eq!(batches.len(), 1);
        assert!(batches[0].contains(text), "{}", batches[0]);
    }
}

/// Content lines of a batch, without the footer.
fn body_lines(batch: &str) -> Vec<&str> {
    batch
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter(|l| !l.starts_with("Update time:") && !l.starts_with("New version available"))
        .collect()
}

fn small_report() -> ReportData {
    ReportData {
        mode: ReportMode::Daily,
        stats: vec![TrendStat {
            word: "rust".into(),
            count: 1,
            position: 0,
            titles: vec![title("fresh-ten!".into(), "Weibo", 1, false)],
            percentage: 100.0,
        }],
        new_titles: vec![NewTitleSection {
            source_id: "zhihu".into(),
            source_name: "Zhihu".into(),
            titles: vec![title("fresh-one".into(), "Zhihu", 1, true)],
        }],
        failed_ids: vec!["toutiao".into()],
        total_new_count: 1,
    }
}

#[test]
fn no_batch_ends_in_a_section_header() {
    let ctx = RenderContext { update: None, ..ctx() };
    let dialect = Dialect::plain();
    for (report, budgets) in [(small_report(), 150..=260), (big_report(), 300..=700)] {
        for budget in budgets.step_by(5) {
            let batches = split_report(&report, &dialect, budget, &ctx);
            if report.stats[0].titles.len() == 1 {
                // Single-item sections never need a restart prefix.
                let joined = batches.concat();
                for header in ["Hot keywords", "New this crawl", "Failed sources:"] {
                    assert_eq!(joined.matches(header).count(), 1, "budget {budget}: '{header}' repeated");
                }
            }
            for b in &batches {
                let last = body_lines(b).last().copied().unwrap_or("");
                assert!(last.starts_with("  "), "budget {budget}: batch ends in a header:\n{b}");
            }
        }
    }
}

#[test]
fn many_batches_reserve_room_for_wide_labels() {
    let ctx = RenderContext { update: None, ..ctx() };
    let report = ReportData {
        mode: ReportMode::Daily,
        stats: vec![TrendStat {
            word: "long".into(),
            count: 150,
            position: 0,
            titles: (1..=150u32).map(|n| title(format!("t{n:03}"), "Weibo", n, false)).collect(),
            percentage: 100.0,
        }],
        new_titles: Vec::new(),
        failed_ids: Vec::new(),
        total_new_count: 0,
    };
    let dialect = Dialect::plain();
    let budget = 160;
    let batches = split_report(&report, &dialect, budget, &ctx);
    let n = batches.len();
    assert!(n > 99, "expected a three-digit batch count, got {n}");
    for b in &batches {
        assert!(b.len() + dialect.batch_header(n, n).len() <= budget);
    }
    for b in add_batch_headers(batches, &dialect, budget) {
        assert!(b.len() <= budget);
        assert!(b.ends_with("Update time: 2025-03-01 21:05:00"), "{b}");
    }
}
