// src/exec/stage_commands.rs

//! Where task commands come from.
//!
//! The project asks a [`StageCommands`] implementation for every
//! (episode, stage) pair when it builds the graph. [`ShellStageCommands`]
//! emits the standard tool chain (assfonts, ffmpeg, vspipe/x265, mkvtoolnix);
//! tests plug in their own commands.
//!
//! Commands run with the episode directory as working directory and resolve
//! per-episode inputs (raw subtitles, chapters) with shell globs at run time,
//! so building the graph never has to look inside the episode directory.

use std::fmt::Debug;

use crate::dag::layout::EpisodeLayout;
use crate::exec::command::{quote, quote_path, CommandSpec, ProfileKind};
use crate::types::{Lang, StageKind};

pub trait StageCommands: Send + Sync + Debug {
    /// Command for `stage` of the episode at `layout`.
    ///
    /// `langs` is the project's ordered hardsub language list.
    fn command_for(&self, layout: &EpisodeLayout, stage: StageKind, langs: &[Lang]) -> CommandSpec;
}

/// The standard encode pipeline.
#[derive(Debug, Clone, Default)]
pub struct ShellStageCommands;

impl StageCommands for ShellStageCommands {
    fn command_for(&self, layout: &EpisodeLayout, stage: StageKind, langs: &[Lang]) -> CommandSpec {
        match stage {
            StageKind::SubtitleProcess => CommandSpec::shell(subtitle_process(layout, langs)),
            StageKind::SubtitleCleanup => CommandSpec::shell(
                "find . -maxdepth 1 -type f -name '*.ass' ! -name '*.rename.ass' -delete",
            ),
            StageKind::Audio => CommandSpec::shell(audio(layout)),
            StageKind::Video => CommandSpec::Encode {
                profile: ProfileKind::Normal,
                script: layout.video_script(),
                output: layout.video(),
            },
            StageKind::Merge => CommandSpec::shell(format!(
                "mkvmerge -o {} --language 0:ja {} {}",
                quote_path(&layout.merged()),
                quote_path(&layout.video()),
                quote_path(&layout.audio_flac()),
            )),
            StageKind::Mux => CommandSpec::shell(mux(layout, langs)),
            StageKind::Hardsub(lang) => CommandSpec::Encode {
                profile: ProfileKind::Hardsub,
                script: layout.hardsub_script(lang),
                output: layout.hardsub_video(lang),
            },
            StageKind::HardsubMerge(lang) => CommandSpec::shell(format!(
                "mkvmerge -o {} --language 0:und {} --language 0:ja {} --chapters {}",
                quote_path(&layout.hardsub_final(lang)),
                quote_path(&layout.hardsub_video(lang)),
                quote_path(&layout.audio_aac()),
                FIRST_CHAPTER_FILE,
            )),
            StageKind::Organize => CommandSpec::shell(organize(layout, langs)),
        }
    }
}

/// First chapter file in the working directory.
const FIRST_CHAPTER_FILE: &str = r#""$(ls -1 ./*.txt | head -n 1)""#;

/// Track language tag and title for a soft subtitle track.
fn subtitle_track(lang: Lang) -> (&'static str, &'static str) {
    match lang {
        Lang::Chs => ("zh-cn", "简日双语"),
        Lang::Cht => ("zh-tw", "繁日双语"),
    }
}

fn subtitle_process(layout: &EpisodeLayout, langs: &[Lang]) -> String {
    let mut cmd = String::from("assfonts");
    for lang in langs {
        cmd.push_str(&format!(
            r#" -i "$(ls -1 ./*{lang}_jpn.ass | grep -v '\.rename\.ass$' | head -n 1)""#
        ));
    }
    cmd.push_str(&format!(" -f {} -r -c", quote_path(&layout.fonts_library())));

    for &lang in langs {
        let target = layout.renamed_subtitle(lang);
        let target_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // assfonts names its output after the input; normalise to `NN.<lang>_jpn.rename.ass`.
        cmd.push_str(&format!(
            " && for f in ./*.{lang}_jpn.rename.ass; do [ \"$f\" = {} ] || mv -f \"$f\" {}; done",
            quote(&format!("./{target_name}")),
            quote(&target_name),
        ));
    }
    cmd
}

fn audio(layout: &EpisodeLayout) -> String {
    let wav = quote_path(&layout.audio_wav());
    format!(
        "ffmpeg -y -i {src} -c:a pcm_s24le {wav} && flaldf {wav} -o {flac} && \
         ffmpeg -y -i {wav} -c:a aac_at -global_quality:a 14 -aac_at_mode 2 -b:a 320k {aac}",
        src = quote_path(&layout.source()),
        flac = quote_path(&layout.audio_flac()),
        aac = quote_path(&layout.audio_aac()),
    )
}

fn mux(layout: &EpisodeLayout, langs: &[Lang]) -> String {
    let temp = layout.mux_temp();
    let video = quote_path(&temp.join("video.hevc"));
    let audio = quote_path(&temp.join("audio.flac"));
    let muxed = quote_path(&layout.muxed());
    let fonts = quote_path(&layout.subset_fonts());

    let mut subs = String::new();
    for (idx, &lang) in langs.iter().enumerate() {
        let (tag, title) = subtitle_track(lang);
        let default = if idx == 0 { "yes" } else { "no" };
        subs.push_str(&format!(
            " --language 0:{tag} --track-name 0:{title} --default-track 0:{default} {}",
            quote_path(&layout.renamed_subtitle(lang)),
        ));
    }

    let mut cmd = format!(
        "mkdir -p {temp} && mkvextract {merged} tracks 0:{video} 1:{audio} && \
         mkvmerge -o {muxed} --language 0:und {video} --language 0:ja {audio}{subs} --chapters {chapters}",
        temp = quote_path(&temp),
        merged = quote_path(&layout.merged()),
        chapters = FIRST_CHAPTER_FILE,
    );
    for (ext, mime) in [("ttf", "font/ttf"), ("otf", "font/otf")] {
        cmd.push_str(&format!(
            " && find {fonts} -type f -name '*.{ext}' -exec mkvpropedit {muxed} \
             --attachment-mime-type {mime} --add-attachment {{}} \\;"
        ));
    }
    cmd.push_str(&format!(" && rm -rf {}", quote_path(&temp)));
    cmd
}

fn organize(layout: &EpisodeLayout, langs: &[Lang]) -> String {
    let mut cmd = format!(
        "mkdir -p {} && cp {} {}",
        quote_path(&layout.results_dir()),
        quote_path(&layout.muxed()),
        quote_path(&layout.result_complete()),
    );
    for &lang in langs {
        cmd.push_str(&format!(
            " && cp {} {}",
            quote_path(&layout.hardsub_final(lang)),
            quote_path(&layout.result_hardsub(lang)),
        ));
    }
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_stages_are_deferred() {
        let layout = EpisodeLayout::new("/p", 1);
        let cmds = ShellStageCommands;
        for stage in StageKind::template(&Lang::ALL) {
            let spec = cmds.command_for(&layout, stage, &Lang::ALL);
            let expect_deferred = matches!(stage, StageKind::Video | StageKind::Hardsub(_));
            assert_eq!(spec.is_deferred(), expect_deferred, "{stage}");
        }
    }

    #[test]
    fn organize_copies_every_language() {
        let layout = EpisodeLayout::new("/p", 4);
        let CommandSpec::Shell(cmd) =
            ShellStageCommands.command_for(&layout, StageKind::Organize, &Lang::ALL)
        else {
            panic!("organize should be a literal command");
        };
        assert!(cmd.starts_with("mkdir -p /p/result && cp /p/E04/final_with_subs.mkv"));
        assert!(cmd.contains("/p/result/E04_chs.mkv"));
        assert!(cmd.contains("/p/result/E04_cht.mkv"));
    }

    #[test]
    fn mux_marks_first_language_default() {
        let layout = EpisodeLayout::new("/p", 1);
        let CommandSpec::Shell(cmd) =
            ShellStageCommands.command_for(&layout, StageKind::Mux, &[Lang::Cht, Lang::Chs])
        else {
            panic!("mux should be a literal command");
        };
        assert!(cmd.contains("--language 0:zh-tw --track-name 0:繁日双语 --default-track 0:yes"));
        assert!(cmd.contains("--language 0:zh-cn --track-name 0:简日双语 --default-track 0:no"));
    }
}
