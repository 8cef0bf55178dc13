//! スナップショットの JSON Lines 出力
//!
//! シミュレーションコアの外側に置く出力側の協調部品です。1ステップにつき
//! 1行の JSON オブジェクトを書き出し、外部の描画ツールがフレームを生成できるようにします。

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::snapshot::NetworkSnapshot;

/// 出力ファイル名
pub const SNAPSHOT_FILE: &str = "snapshots.jsonl";

/// タグ間リンクの有無ごとの出力ディレクトリ
pub fn run_directory(base: &Path, tag_links: bool) -> PathBuf {
    base.join(if tag_links { "taglinks" } else { "notaglinks" })
}

pub struct SnapshotWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    written: u64,
}

impl SnapshotWriter {
    /// 出力先ディレクトリを作成し、スナップショットファイルを開く
    pub fn create(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(SNAPSHOT_FILE);
        let file = File::create(&path)?;
        debug!("スナップショット出力先: {}", path.display());

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn write(&mut self, snapshot: &NetworkSnapshot) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    /// バッファを書き出して閉じる
    pub fn finish(mut self) -> io::Result<u64> {
        self.writer.flush()?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioConfig;
    use crate::simulation::SimulationEngine;

    #[test]
    fn test_run_directory() {
        let base = Path::new("results");
        assert_eq!(run_directory(base, true), Path::new("results/taglinks"));
        assert_eq!(run_directory(base, false), Path::new("results/notaglinks"));
    }

    #[test]
    fn test_writes_one_line_per_step() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_directory(dir.path(), true);
        let mut writer = SnapshotWriter::create(&out).unwrap();

        let mut scenario = ScenarioConfig::reference_arena();
        scenario.sim.t_max_s = 1.0;
        let mut engine = SimulationEngine::new(scenario).unwrap();
        engine.run(|snapshot| writer.write(snapshot)).unwrap();
        let path = writer.path().to_path_buf();
        assert_eq!(writer.finish().unwrap(), 10);

        let contents = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 10);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["step"], 1);
        assert_eq!(first["anchors"].as_array().unwrap().len(), 6);
        assert_eq!(first["tags"][0]["id"], "T0");
        assert_eq!(first["tags"][0]["kind"], "MOBILE");
    }
}
