//! Unit tests for core Tankobon functionality.
//!
//! Tests individual components through the public API, on real files, without
//! running a whole packaging run.

use image::{GenericImageView, Rgb};
use tankobon::dedup::Dedup;
use tankobon::error::{Error, Result};
use tankobon::filter::ComicFilter;
use tankobon::image_pipeline::{DownSample, EncodeOptions, ImagePipeline};
use tankobon::prelude::*;
use tankobon::split::split;

mod common;
use common::{cleanup, create_dummy_image, create_pattern_image, setup_test_dirs};

#[tokio::test]
async fn test_config_builder_validation() -> Result<()> {
    let result = TankobonConfig::builder().fixed_ext("jxl").build();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Unsupported fixed_ext"));

    let result = TankobonConfig::builder()
        .crop_lower_threshold(10u8)
        .crop_upper_threshold(5u8)
        .build();
    assert!(result.is_err());

    let config = TankobonConfig::builder()
        .fixed_ext("png")
        .interpolation(ResizeKernel::Lanczos)
        .build()?;
    assert_eq!(config.fixed_kind()?, Some(ImageKind::Png));
    Ok(())
}

#[tokio::test]
async fn test_config_preflight_check() -> Result<()> {
    let dirs = setup_test_dirs("preflight_check").await;

    let nested = dirs.output_dir.join("a").join("b");
    let config = TankobonConfig::builder().output_path(nested.clone()).build()?;
    config.preflight_check().await?;
    assert!(nested.is_dir());

    let file_path = dirs.base.join("not-a-dir");
    tokio::fs::write(&file_path, b"x").await?;
    let config = TankobonConfig::builder().output_path(file_path).build()?;
    let result = config.preflight_check().await;
    assert!(matches!(result, Err(Error::InvalidPath(_, _))));

    let config = TankobonConfig::builder()
        .source_path(dirs.base.join("missing"))
        .output_path(dirs.output_dir.clone())
        .build()?;
    assert!(matches!(config.convert_from_source().await, Err(Error::NotFound(_))));

    cleanup(&dirs).await;
    Ok(())
}

#[tokio::test]
async fn test_parsed_comic_split_round_trip() -> Result<()> {
    let dirs = setup_test_dirs("split_round_trip").await;
    let comic_dir = dirs.source_dir.join("Saga");
    for chapter in 1..=7 {
        for page in 1..=2 {
            create_dummy_image(
                &comic_dir.join(format!("Ch {}", chapter)).join(format!("{}.png", page)),
                Rgb([chapter as u8 * 30, 0, 0]),
            )
            .await?;
        }
    }

    let comic = GeneralParser.parse(&comic_dir).await?;
    assert_eq!(comic.chapter_count(), 7);

    for n in 1..=8 {
        let parts = split(&comic, &SplitPolicy::fixed(n));
        let rejoined: Vec<Chapter> = parts.iter().flat_map(|p| p.chapters.clone()).collect();
        assert_eq!(rejoined, comic.chapters, "fixed({}) lost chapters", n);
        assert_eq!(parts.len(), 7usize.div_ceil(n));
    }

    let parts = split(&comic, &SplitPolicy::manual(vec![1.0, 3.0, 3.0, 6.0, 42.0]));
    let sizes: Vec<usize> = parts.iter().map(Comic::chapter_count).collect();
    assert_eq!(sizes, vec![2, 3, 2]);
    assert_eq!(parts[0].title, "Saga-0");

    cleanup(&dirs).await;
    Ok(())
}

#[tokio::test]
async fn test_filter_rank_threshold() -> Result<()> {
    let counts = [1usize, 1, 1, 1, 10];
    let mut comic = Comic::new(
        "Ranked",
        counts
            .iter()
            .enumerate()
            .map(|(i, n)| {
                Chapter::new(
                    i as f64,
                    format!("c{}", i),
                    (0..*n).map(|p| Page::new(p as f64, p.to_string(), "x.png")).collect(),
                )
            })
            .collect(),
    );

    let strict = ComicFilter::new(None, None, Some(5), Some(0.5), LogScope::default());
    assert!(!FilterPipeline::new().with(strict).accept(&mut comic));

    let lenient = ComicFilter::new(None, None, Some(5), Some(0.9), LogScope::default());
    assert!(FilterPipeline::new().with(lenient).accept(&mut comic));
    Ok(())
}

#[tokio::test]
async fn test_dedup_on_files() -> Result<()> {
    let dirs = setup_test_dirs("dedup_files").await;
    let comic_dir = dirs.source_dir.join("Dup");
    create_pattern_image(&comic_dir.join("a").join("1.png"), 0).await?;
    create_pattern_image(&comic_dir.join("a").join("2.png"), 2).await?;
    create_pattern_image(&comic_dir.join("b").join("1.png"), 1).await?;
    create_pattern_image(&comic_dir.join("b").join("2.png"), 2).await?;

    let mut comic = GeneralParser.parse(&comic_dir).await?;
    let mut processing = ProcessPipeline::new();
    processing.push(Dedup::new(
        HashAlgorithm::PHash,
        DedupFailurePolicy::Skip,
        LogScope::default(),
    ));
    let warnings = processing.run(&mut comic)?;

    assert!(warnings.is_empty());
    assert_eq!(comic.chapter_count(), 3);
    assert_eq!(comic.chapters[0].pages.len(), 1);
    assert_eq!(comic.chapters[1].pages.len(), 1);
    let copyright = &comic.chapters[2];
    assert_eq!(copyright.title, "copyright");
    assert_eq!(copyright.pages.len(), 1);
    assert_eq!(copyright.pages[0].title, "0001");
    assert_eq!(comic.total_pages(), 3);

    cleanup(&dirs).await;
    Ok(())
}

#[tokio::test]
async fn test_dedup_failure_policies() -> Result<()> {
    let dirs = setup_test_dirs("dedup_policies").await;
    let comic_dir = dirs.source_dir.join("Broken");
    create_pattern_image(&comic_dir.join("a").join("1.png"), 2).await?;
    tokio::fs::write(comic_dir.join("a").join("2.png"), b"not a png").await?;

    let comic = GeneralParser.parse(&comic_dir).await?;

    let mut skipped = comic.clone();
    let mut processing = ProcessPipeline::new();
    processing.push(Dedup::new(HashAlgorithm::DHash, DedupFailurePolicy::Skip, LogScope::default()));
    let warnings = processing.run(&mut skipped)?;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].page, "2");
    assert_eq!(skipped.total_pages(), 2);

    let mut aborted = comic.clone();
    let mut processing = ProcessPipeline::new();
    processing.push(Dedup::new(HashAlgorithm::DHash, DedupFailurePolicy::Abort, LogScope::default()));
    assert!(processing.run(&mut aborted).is_err());

    cleanup(&dirs).await;
    Ok(())
}

#[tokio::test]
async fn test_image_pipeline_downsample_and_convert() -> Result<()> {
    let dirs = setup_test_dirs("image_pipeline").await;
    let path = dirs.source_dir.join("wide.png");
    let img = image::RgbImage::from_pixel(2000, 1000, Rgb([10, 200, 30]));
    img.save(&path).map_err(Error::Image)?;
    let data = tokio::fs::read(&path).await?;

    let pipeline = ImagePipeline::new(Some(ImageKind::Jpeg), EncodeOptions::default())
        .with(DownSample::new(1000, 1000, ResizeKernel::Linear));
    let (out, ext) = pipeline.process(&data, "png")?;
    assert_eq!(ext, "jpg");
    let decoded = image::load_from_memory(&out).map_err(Error::Image)?;
    assert_eq!(decoded.dimensions(), (1000, 500));

    let passthrough = ImagePipeline::new(None, EncodeOptions::default());
    let (out, ext) = passthrough.process(&data, "png")?;
    assert_eq!(ext, "png");
    let decoded = image::load_from_memory(&out).map_err(Error::Image)?;
    assert_eq!(decoded.dimensions(), (2000, 1000));

    assert!(matches!(
        passthrough.process(b"garbage", "png"),
        Err(Error::CorruptImage(_))
    ));

    cleanup(&dirs).await;
    Ok(())
}

#[tokio::test]
async fn test_run_report_summary() {
    let mut report = RunReport::default();
    report.comics.push(ComicReport::new("a", None, PackOutcome::Written));
    report.comics.push(ComicReport::new("b", None, PackOutcome::SkippedExists));
    report.comics.push(ComicReport::new("c", None, PackOutcome::Rejected));
    let mut failed = ComicReport::new("d", None, PackOutcome::Failed("disk full".into()));
    failed.warnings.push(PageWarning {
        chapter: Some("ch".into()),
        page: "3".into(),
        message: "Corrupt image: truncated".into(),
    });
    report.comics.push(failed);

    assert_eq!(report.to_string(), "1 written, 1 skipped, 1 rejected, 1 failed");
    let warnings: Vec<_> = report.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].0, "d");
    assert_eq!(warnings[0].1.to_string(), "Corrupt image: truncated: 3 in ch");
}
