// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end splitting of real PDFs: scanned-style pages (one full-page RGB
// image each) with a highlighter ring drawn in a corner of some of them.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use pagemark_core::{AppConfig, DetectorConfig, Pattern};
use pagemark_document::{
    MarkerDetector, PageDocument, PdfDocument, SegmentJob, Segmenter, SplitOutcome,
};

const PAGE: u32 = 200;
const YELLOW: [u8; 3] = [250, 235, 40];

#[derive(Clone, Copy)]
enum Mark {
    None,
    TopRight,
    BottomLeft,
}

/// RGB samples of one page with an optional 80px ring in a corner.
fn page_pixels(mark: Mark) -> Vec<u8> {
    let origin = match mark {
        Mark::None => None,
        Mark::TopRight => Some((110, 10)),
        Mark::BottomLeft => Some((10, 110)),
    };
    let mut pixels = Vec::with_capacity((PAGE * PAGE * 3) as usize);
    for y in 0..PAGE {
        for x in 0..PAGE {
            let on_ring = origin.is_some_and(|(ox, oy)| {
                let inside = (ox..ox + 80).contains(&x) && (oy..oy + 80).contains(&y);
                let core = (ox + 4..ox + 76).contains(&x) && (oy + 4..oy + 76).contains(&y);
                inside && !core
            });
            pixels.extend_from_slice(if on_ring { &YELLOW } else { &[255, 255, 255] });
        }
    }
    pixels
}

fn write_scan(path: &Path, marks: &[Mark]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for &mark in marks {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => PAGE as i64,
                "Height" => PAGE as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            page_pixels(mark),
        ));
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            format!("q {PAGE} 0 0 {PAGE} 0 0 cm /Im0 Do Q").into_bytes(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE as i64),
                Object::Integer(PAGE as i64),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Corner points of a square, matching the drawn rings.
fn square_pattern() -> Pattern {
    Pattern::from(vec![[0, 0], [40, 0], [40, 40], [0, 40]])
}

#[test]
fn detector_sees_rings_in_either_corner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    write_scan(&path, &[Mark::None, Mark::TopRight, Mark::BottomLeft]);

    let document = PdfDocument::open(&path).unwrap();
    assert_eq!(document.page_count(), 3);

    let detector = MarkerDetector::new(square_pattern(), &DetectorConfig::default());
    let verdicts: Vec<bool> = (0..3)
        .map(|index| detector.page_has_marker(&document, index))
        .collect();
    assert_eq!(verdicts, vec![false, true, true]);
}

#[test]
fn verdicts_do_not_depend_on_page_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    write_scan(&path, &[Mark::TopRight, Mark::None, Mark::BottomLeft]);

    let document = PdfDocument::open(&path).unwrap();
    let detector = MarkerDetector::new(square_pattern(), &DetectorConfig::default());
    let verdicts: Vec<(usize, bool)> = [2, 1, 0, 0, 2, 1]
        .into_iter()
        .map(|index| (index, detector.page_has_marker(&document, index)))
        .collect();
    assert_eq!(
        verdicts,
        vec![(2, true), (1, false), (0, true), (0, true), (2, true), (1, false)]
    );
}

#[test]
fn marked_pages_start_new_documents() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("batch.pdf");
    let out = dir.path().join("out");
    write_scan(
        &input,
        &[
            Mark::None,
            Mark::None,
            Mark::TopRight,
            Mark::None,
            Mark::BottomLeft,
        ],
    );

    let segmenter = Segmenter::pdf(&AppConfig::default());
    let outcome = segmenter
        .split(&SegmentJob {
            input: input.clone(),
            output_dir: out.clone(),
            pattern: square_pattern(),
            delete_source: true,
        })
        .unwrap();

    let outputs = match outcome {
        SplitOutcome::Split {
            outputs,
            source_deleted,
        } => {
            assert!(source_deleted);
            outputs
        }
        SplitOutcome::Untouched => panic!("expected a split"),
    };
    assert!(!input.exists());

    let names: Vec<String> = outputs
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["batch_split_1.pdf", "batch_split_2.pdf", "batch_split_3.pdf"]
    );

    let page_counts: Vec<usize> = outputs
        .iter()
        .map(|p| PdfDocument::open(p).unwrap().page_count())
        .collect();
    assert_eq!(page_counts, vec![2, 2, 1]);

    // Each later segment opens on its marked page.
    let detector = MarkerDetector::new(square_pattern(), &DetectorConfig::default());
    let second = PdfDocument::open(&outputs[1]).unwrap();
    assert!(detector.page_has_marker(&second, 0));
    assert!(!detector.page_has_marker(&second, 1));
}

#[test]
fn unmarked_scan_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("plain.pdf");
    let out = dir.path().join("out");
    write_scan(&input, &[Mark::None, Mark::None]);

    let segmenter = Segmenter::pdf(&AppConfig::default());
    let job = SegmentJob {
        input: input.clone(),
        output_dir: out.clone(),
        pattern: square_pattern(),
        delete_source: true,
    };
    assert_eq!(segmenter.split(&job).unwrap(), SplitOutcome::Untouched);
    assert!(input.exists());
    assert!(!out.exists());
}
