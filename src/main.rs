use std::path::{Path, PathBuf};

use clap::{Arg, Command};
use tracing::info;

use locsim::export::{SnapshotWriter, run_directory};
use locsim::logging::{LogConfig, LogOutput, init_logging, level_from_verbosity, parse_log_level};
use locsim::scenario::ScenarioConfig;
use locsim::simulation::{RunSummary, SimulationEngine};

/// タグ間リンクの実行モード
#[derive(Debug, Clone, Copy, PartialEq)]
enum TagLinkMode {
    /// シナリオ設定に従う
    Scenario,
    On,
    Off,
    /// 有効・無効の2回を独立に実行
    Both,
}

impl TagLinkMode {
    fn parse(value: Option<&String>) -> Result<Self, String> {
        match value.map(|v| v.to_lowercase()) {
            None => Ok(TagLinkMode::Scenario),
            Some(v) => match v.as_str() {
                "on" | "true" => Ok(TagLinkMode::On),
                "off" | "false" => Ok(TagLinkMode::Off),
                "both" => Ok(TagLinkMode::Both),
                _ => Err(format!("無効なタグ間リンク指定: {}. 利用可能: on, off, both", v)),
            },
        }
    }

    fn runs(self, scenario_default: bool) -> Vec<bool> {
        match self {
            TagLinkMode::Scenario => vec![scenario_default],
            TagLinkMode::On => vec![true],
            TagLinkMode::Off => vec![false],
            TagLinkMode::Both => vec![true, false],
        }
    }
}

fn main() {
    let matches = Command::new("locsim")
        .version("0.1.0")
        .about("測位センサーネットワークシミュレーション")
        .long_about(
            "固定アンカーと移動タグからなる2次元測位ネットワークのシミュレーション\n\
             固定時間刻みでタグを移動させ、近傍関係と位置推定の不確かさを追跡します。",
        )
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help(
                    "実行するシナリオファイル(.yaml)のパスを指定します。\n\
                     指定しない場合、組み込みの基準アリーナで実行されます。",
                ),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了"),
        )
        .arg(
            Arg::new("tag-links")
                .short('l')
                .long("tag-links")
                .value_name("MODE")
                .help("タグ間リンクの指定 (on, off, both)"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("スナップショットを JSON Lines で出力するディレクトリ"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("OUTPUT")
                .default_value("console")
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 詳細, -vv: ステップごと)"),
        )
        .get_matches();

    let level = match matches.get_one::<String>("log-level") {
        Some(level) => parse_log_level(level),
        None => level_from_verbosity(matches.get_count("verbose")),
    };
    let output = match matches
        .get_one::<String>("log-output")
        .map(|s| s.parse::<LogOutput>())
        .unwrap_or(Ok(LogOutput::Console))
    {
        Ok(output) => output,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(2);
        }
    };

    let log_config = LogConfig {
        level,
        output,
        ..LogConfig::default()
    };
    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("エラー: ログ初期化に失敗しました: {}", e);
            std::process::exit(1);
        }
    };

    let mode = match TagLinkMode::parse(matches.get_one::<String>("tag-links")) {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(2);
        }
    };
    let output_dir = matches.get_one::<String>("output").map(PathBuf::from);

    let result = run(
        matches.get_one::<String>("scenario").map(String::as_str),
        matches.get_flag("info"),
        mode,
        output_dir.as_deref(),
    );

    if let Err(e) = result {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// シナリオを読み込んで実行
fn run(
    scenario_path: Option<&str>,
    info_only: bool,
    mode: TagLinkMode,
    output_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = match scenario_path {
        Some(path) => {
            let scenario = ScenarioConfig::from_file(path)?;
            info!("シナリオファイル読み込み完了: {}", path);
            scenario
        }
        None => ScenarioConfig::reference_arena(),
    };

    scenario.print_summary();
    if info_only {
        return Ok(());
    }
    println!();

    for tag_links in mode.runs(scenario.network.tag_links) {
        let summary = execute(scenario.clone(), tag_links, output_dir)?;
        print_run_summary(&summary);
    }

    Ok(())
}

/// 1回分の実行
fn execute(
    scenario: ScenarioConfig,
    tag_links: bool,
    output_dir: Option<&Path>,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let mut engine = SimulationEngine::new(scenario)?.with_tag_links(tag_links);

    match output_dir {
        Some(base) => {
            let mut writer = SnapshotWriter::create(&run_directory(base, tag_links))?;
            // 初期状態（ステップ0）も出力する
            writer.write(&engine.network().snapshot())?;
            let summary = engine.run(|snapshot| writer.write(snapshot))?;
            let path = writer.path().to_path_buf();
            let written = writer.finish()?;
            info!("スナップショット {}件を出力: {}", written, path.display());
            Ok(summary)
        }
        None => Ok(engine.run(|_| Ok::<(), std::io::Error>(()))?),
    }
}

fn print_run_summary(summary: &RunSummary) {
    println!(
        "=== 実行結果 (タグ間リンク: {}) ===",
        if summary.tag_links { "有効" } else { "無効" }
    );
    println!("ステップ数: {}", summary.steps);
    println!("経過時間: {:.2}秒", summary.elapsed);
    for tag in &summary.tags {
        println!(
            "  {}: 位置 {} 近傍 {} 不確かさ {:.3}",
            tag.id, tag.position, tag.neighbor_count, tag.uncertainty
        );
    }
    println!();
}
