//! ffmpeg command plans for the post-processing stages.
//!
//! Every transcode writes a sibling temp file with an explicit `-f` muxer, so
//! the output container matches the input whatever the temp name looks like.

use std::path::Path;

use super::{CommandSpec, MediaTools, ProbePlan, StageSpec, TranscodePlan};
use crate::models::Dimensions;
use crate::utils::paths::{with_appended_suffix, with_infix};
use crate::utils::Container;

impl MediaTools {
    /// Probe width/height of the first video stream.
    pub fn probe(&self, path: &Path) -> StageSpec {
        StageSpec::Probe(ProbePlan::new(&self.ffprobe, &self.ffmpeg, path))
    }

    /// Re-encode with square pixels and the display aspect of `dims`.
    pub fn normalize(&self, path: &Path, container: Container, dims: Dimensions) -> StageSpec {
        let output = with_infix(path, "normalized");
        let step = self
            .ffmpeg_input(path)
            .arg("-vf")
            .arg(format!("setsar=1,setdar={}/{}", dims.width, dims.height))
            .args(["-c:v", "libx264", "-preset", "veryfast", "-crf", "18", "-c:a", "copy"]);
        let step = ffmpeg_output(step, container, &output);

        StageSpec::Transcode(TranscodePlan {
            steps: vec![step],
            output,
            target: path.to_path_buf(),
            scratch: Vec::new(),
        })
    }

    /// Extract the first frame and attach it as cover art.
    pub fn thumbnail(&self, path: &Path, container: Container) -> StageSpec {
        // Named after the full filename so it cannot collide with a sibling.
        let frame = with_appended_suffix(path, ".thumb.jpg");
        let output = with_infix(path, "thumb");

        let extract = self
            .ffmpeg_input(path)
            .args(["-vf", r"select=eq(n\,0)", "-vframes", "1"])
            .path_arg(&frame);
        let attach = self
            .ffmpeg_input(path)
            .arg("-i")
            .path_arg(&frame)
            .args(["-map", "0", "-map", "1", "-c", "copy", "-disposition:v:1", "attached_pic"]);
        let attach = ffmpeg_output(attach, container, &output);

        StageSpec::Transcode(TranscodePlan {
            steps: vec![extract, attach],
            output,
            target: path.to_path_buf(),
            scratch: vec![frame],
        })
    }

    /// Scale to exactly `target`.
    pub fn resize(&self, path: &Path, container: Container, target: Dimensions) -> StageSpec {
        let output = with_infix(path, "resized");
        let step = self
            .ffmpeg_input(path)
            .arg("-vf")
            .arg(format!(
                "scale={w}:{h},setsar=1,setdar={w}/{h}",
                w = target.width,
                h = target.height
            ))
            .args(["-c:a", "copy"]);
        let step = ffmpeg_output(step, container, &output);

        StageSpec::Transcode(TranscodePlan {
            steps: vec![step],
            output,
            target: path.to_path_buf(),
            scratch: Vec::new(),
        })
    }

    fn ffmpeg_input(&self, path: &Path) -> CommandSpec {
        CommandSpec::new(&self.ffmpeg)
            .args(["-y", "-i"])
            .path_arg(path)
    }
}

fn ffmpeg_output(command: CommandSpec, container: Container, output: &Path) -> CommandSpec {
    command.args(["-f", container.muxer()]).path_arg(output)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn tools() -> MediaTools {
        MediaTools {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }

    fn transcode(spec: StageSpec) -> TranscodePlan {
        match spec {
            StageSpec::Transcode(plan) => plan,
            other => panic!("expected transcode plan, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_plan() {
        let plan = transcode(tools().normalize(
            Path::new("/m/clip.mp4"),
            Container::Mp4,
            Dimensions::new(1280, 720),
        ));
        assert_eq!(plan.output, PathBuf::from("/m/clip.normalized.mp4"));
        assert_eq!(plan.target, PathBuf::from("/m/clip.mp4"));
        assert_eq!(
            plan.steps[0].to_string(),
            "ffmpeg -y -i /m/clip.mp4 -vf setsar=1,setdar=1280/720 -c:v libx264 \
             -preset veryfast -crf 18 -c:a copy -f mp4 /m/clip.normalized.mp4"
        );
    }

    #[test]
    fn test_extensionless_input_names_its_muxer() {
        let plan = transcode(tools().normalize(
            Path::new("/m/download"),
            Container::Matroska,
            Dimensions::new(640, 480),
        ));
        assert_eq!(plan.output, PathBuf::from("/m/download.normalized"));
        assert!(plan.steps[0]
            .to_string()
            .ends_with("-f matroska /m/download.normalized"));

        let plan = transcode(tools().thumbnail(Path::new("/m/download"), Container::Mp4));
        assert_eq!(plan.scratch, vec![PathBuf::from("/m/download.thumb.jpg")]);
        assert!(plan.steps[1].to_string().ends_with("-f mp4 /m/download.thumb"));
    }

    #[test]
    fn test_thumbnail_plan() {
        let plan = transcode(tools().thumbnail(Path::new("/m/clip.mkv"), Container::Matroska));
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.scratch, vec![PathBuf::from("/m/clip.mkv.thumb.jpg")]);
        assert_eq!(plan.output, PathBuf::from("/m/clip.thumb.mkv"));
        assert!(plan.steps[0].args.contains(&r"select=eq(n\,0)".to_string()));
        assert!(plan.steps[0].to_string().ends_with("/m/clip.mkv.thumb.jpg"));
        assert!(plan.steps[1].args.contains(&"attached_pic".to_string()));
    }

    #[test]
    fn test_thumbnail_frames_do_not_collide() {
        let mp4 = transcode(tools().thumbnail(Path::new("/m/clip.mp4"), Container::Mp4));
        let mkv = transcode(tools().thumbnail(Path::new("/m/clip.mkv"), Container::Matroska));
        assert_ne!(mp4.scratch, mkv.scratch);
        assert!(!mp4.scratch.contains(&PathBuf::from("/m/clip.jpg")));
    }

    #[test]
    fn test_resize_plan() {
        let plan = transcode(tools().resize(
            Path::new("/m/clip.mov"),
            Container::QuickTime,
            Dimensions::new(640, 360),
        ));
        assert_eq!(plan.output, PathBuf::from("/m/clip.resized.mov"));
        assert!(plan.steps[0]
            .args
            .contains(&"scale=640:360,setsar=1,setdar=640/360".to_string()));
        assert!(plan.steps[0].to_string().ends_with("-f mov /m/clip.resized.mov"));
    }

    #[test]
    fn test_probe_spec() {
        match tools().probe(Path::new("/m/clip.mp4")) {
            StageSpec::Probe(plan) => assert_eq!(plan.fallback.program_name(), "ffmpeg"),
            other => panic!("expected probe plan, got {:?}", other),
        }
    }
}
