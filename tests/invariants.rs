//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use dualtag_core::{
    compute_layout, derive_keep_outs, layout_text, resolve, resolve_stacking, resolve_stacking_with, validate,
    config::{FontRole, Insets, NfcRecess},
    export::ExportError,
    geometry::{Axis, Point, Rect},
    print::color_switch_layer_index,
    text::{Align, BlockText, Edge, EdgeText, KeepOutShape, PlacementViolationKind, TextStyle, NFC_KEEP_OUT, SLIT_KEEP_OUT},
    BuildError, BuildOptions, ExportDocument, Face, ModuleGrid, TagConfig, TagPipeline, TextRequest, ViolationClass,
};

fn scenario_a_config() -> TagConfig {
    TagConfig {
        canvas_width: 200.0,
        canvas_height: 74.0,
        modules: 29,
        module_size: 2.0,
        quiet_modules: 0,
        qr_padding: Insets::uniform(3.0),
        gutter: 3.0,
        margin: Insets::uniform(3.0),
        ..TagConfig::default()
    }
}

fn finder_like_grid(n: usize) -> ModuleGrid {
    let cells = (0..n * n)
        .map(|i| {
            let (r, c) = (i / n, i % n);
            (r < 7 && c < 7) || (r * 7 + c * 3) % 5 == 0
        })
        .collect();
    ModuleGrid::from_cells(n, cells).unwrap()
}

fn sample_requests() -> Vec<TextRequest> {
    vec![
        TextRequest::Edge(EdgeText {
            id: "title".to_string(),
            text: "LUGGAGE TAG".to_string(),
            edge: Edge::Top,
            font: FontRole::Title,
            font_size: None,
            face: Face::Front,
            style: TextStyle::Emboss,
        }),
        TextRequest::Block(BlockText {
            id: "owner".to_string(),
            lines: vec![
                "Jane Doe".to_string(),
                "+1 555 0100".to_string(),
                "jane@example.org".to_string(),
            ],
            font: FontRole::Contact,
            font_size: None,
            face: Face::Back,
            style: TextStyle::Emboss,
            align: Align::Start,
            region: None,
        }),
        TextRequest::Edge(EdgeText {
            id: "footer".to_string(),
            text: "IF FOUND PLEASE CALL".to_string(),
            edge: Edge::Bottom,
            font: FontRole::Footer,
            font_size: None,
            face: Face::Back,
            style: TextStyle::Engrave,
        }),
    ]
}

/// Scenario A with the QR pushed right far enough that its reflection on the
/// mirrored face clears the slit, plus an NFC pocket left of centre.
fn clear_config() -> TagConfig {
    let mut config = scenario_a_config();
    config.qr_padding.left = 16.0;
    config.nfc = Some(NfcRecess { diameter: 20.0, depth: 0.8, offset_x: -40.0, offset_y: 0.0 });
    config
}

fn back_block(id: &str, lines: &[&str], region: Rect) -> TextRequest {
    TextRequest::Block(BlockText {
        id: id.to_string(),
        lines: lines.iter().map(|l| l.to_string()).collect(),
        font: FontRole::Contact,
        font_size: None,
        face: Face::Back,
        style: TextStyle::Emboss,
        align: Align::Center,
        region: Some(region),
    })
}

fn build_a() -> dualtag_core::TagBuild {
    TagPipeline::new(scenario_a_config(), BuildOptions::default())
        .build(&finder_like_grid(29), &sample_requests())
        .unwrap()
}

#[test]
fn invariant_scenario_a_fits_without_violations() {
    let config = scenario_a_config();
    let report = validate(&config);
    assert!(report.valid);
    assert!(report.violations.is_empty());
    // Only the advisory about the reflected QR meeting the slit.
    assert!(report.warnings.iter().all(|w| w.rule == "mirror_clearance"));

    let g = compute_layout(&config);
    assert!((g.left_col_width - 64.0).abs() < 1e-9);
    assert!((g.qr_data_size - 58.0).abs() < 1e-9);
}

#[test]
fn invariant_scenario_b_reports_infeasible_layout() {
    let config = TagConfig {
        module_size: 6.0,
        ..scenario_a_config()
    };
    let g = compute_layout(&config);
    assert!((g.left_col_width - 180.0).abs() < 1e-9);

    let report = validate(&config);
    assert!(!report.valid);
    assert!(report.has_class(ViolationClass::LayoutInfeasible));
    assert!(report.violations.iter().any(|v| v.field == "rightColWidth"));

    let err = TagPipeline::new(config, BuildOptions::default())
        .build(&finder_like_grid(29), &[])
        .unwrap_err();
    assert!(matches!(err, BuildError::LayoutInfeasible { .. }));
    assert!(err.is_rejection());
}

#[test]
fn invariant_scenario_c_names_block_and_axis() {
    let mut config = scenario_a_config();
    config.slit.reserve_track = false;
    assert!(validate(&config).valid);

    // Back printed on top, so the slit reads where it is cut.
    let g = compute_layout(&config);
    let stacking = resolve_stacking_with(config.material.total_thickness, config.material.web_thickness, Face::Back).unwrap();
    let keep_outs = derive_keep_outs(&config, &g, &stacking);
    let envelope = keep_outs
        .iter()
        .find(|k| k.name == SLIT_KEEP_OUT && k.scope.covers(Face::Back))
        .map(|k| match k.shape {
            KeepOutShape::Rect { rect } => rect,
            KeepOutShape::Disc { .. } => panic!("slit keep-out is a rectangle"),
        })
        .unwrap();
    assert_eq!(envelope, g.slit.grow(config.material.min_wall));

    let request = TextRequest::Block(BlockText {
        id: "return-address".to_string(),
        lines: vec!["SLIT".to_string()],
        font: FontRole::Contact,
        font_size: Some(4.0),
        face: Face::Back,
        style: TextStyle::Emboss,
        align: Align::End,
        region: Some(Rect::from_edges(40.0, -20.0, envelope.left + 2.0, 5.0)),
    });

    let err = layout_text(&config, &g, &keep_outs, &[request]).unwrap_err();
    assert_eq!(err.block, "return-address");
    assert!(err.to_string().contains("return-address"));
    match &err.kind {
        PlacementViolationKind::KeepOutOverlap { keep_out, axis, overlap } => {
            assert_eq!(keep_out, SLIT_KEEP_OUT);
            assert_eq!(*axis, Axis::X);
            assert!((overlap - 2.0).abs() < 1e-9);
        }
        other => panic!("unexpected violation: {other:?}"),
    }
    assert!(err.required_space().is_some_and(|s| (s - 2.0).abs() < 1e-9));
}

#[test]
fn invariant_scenario_d_stacking_depths() {
    let s = resolve_stacking(3.0, 0.4).unwrap();
    assert!((s.half_depth - 1.3).abs() < 1e-9);
    assert_eq!(s.top_side.face, Face::Front);
    assert!(!s.top_side.mirrored);
    assert_eq!(s.bottom_side.face, Face::Back);
    assert!(s.bottom_side.mirrored);

    let swapped = resolve_stacking_with(3.0, 0.4, Face::Back).unwrap();
    assert_eq!(swapped.half_depth, s.half_depth);
    assert_eq!(swapped.top_side.z_range, s.top_side.z_range);
    assert_eq!(swapped.bottom_side.z_range, s.bottom_side.z_range);
    assert_eq!(swapped.top_side.face, Face::Back);
    assert!(swapped.bottom_side.mirrored);
    assert_eq!(swapped.mirrored_face(), Face::Front);

    assert!(resolve_stacking(0.4, 0.4).is_err());
}

#[test]
fn invariant_same_inputs_same_bytes() {
    let a = build_a();
    let b = build_a();

    assert_eq!(
        a.document.to_canonical_json().unwrap(),
        b.document.to_canonical_json().unwrap()
    );
    assert_eq!(a.digest().unwrap(), b.digest().unwrap());
    assert_eq!(a.vector().to_svg(), b.vector().to_svg());
    assert_eq!(
        a.solid().to_canonical_json().unwrap(),
        b.solid().to_canonical_json().unwrap()
    );
    assert_eq!(a.document.meta.build_id, b.document.meta.build_id);
}

#[test]
fn invariant_different_grid_different_digest() {
    let pipeline = TagPipeline::new(scenario_a_config(), BuildOptions::default());
    let a = pipeline.build(&finder_like_grid(29), &[]).unwrap();

    let mut rows = finder_like_grid(29).to_row_strings();
    rows[28] = rows[28].chars().map(|c| if c == '#' { '.' } else { '#' }).collect();
    let flipped: ModuleGrid = rows.join("\n").parse().unwrap();
    let b = pipeline.build(&flipped, &[]).unwrap();

    assert_ne!(a.document.meta.input_hash, b.document.meta.input_hash);
    assert_ne!(a.digest().unwrap(), b.digest().unwrap());
}

#[test]
fn invariant_validation_is_idempotent() {
    for config in [
        scenario_a_config(),
        TagConfig { module_size: 6.0, ..scenario_a_config() },
        TagConfig { module_size: 1.0, modules: 30, ..scenario_a_config() },
    ] {
        assert_eq!(validate(&config), validate(&config));
    }
}

#[test]
fn invariant_resample_identity_and_center() {
    let g = finder_like_grid(25);
    assert_eq!(resolve(&g, 25).unwrap(), g);

    let mut rows = vec![vec![false; 25]; 25];
    rows[12][12] = true;
    let single = ModuleGrid::from_rows(rows).unwrap();
    assert!(resolve(&single, 1).unwrap().get(0, 0));
}

#[test]
fn invariant_lossy_resample_is_reported() {
    let build = TagPipeline::new(scenario_a_config(), BuildOptions::default())
        .build(&finder_like_grid(25), &[])
        .unwrap();
    assert!(build.resample.lossy);
    assert!(build.document.qr.lossy);
    assert_eq!(build.document.qr.size, 29);
    assert_eq!(build.document.qr.source_size, 25);
}

#[test]
fn invariant_mirrored_artwork_physical_cutouts() {
    let build = build_a();
    let vector = build.vector();
    let front = &vector.groups[0];
    let back = &vector.groups[1];

    assert_eq!(front.face, Face::Front);
    assert!(!front.mirrored);
    assert!(back.mirrored);
    assert_eq!(front.modules.len(), back.modules.len());
    for (f, b) in front.modules.iter().zip(&back.modules) {
        assert_eq!((f.row, f.col), (b.row, b.col));
        assert_eq!(f.rect.mirrored_x(), b.rect);
    }

    let owner = build.placements.iter().find(|p| p.block == "owner").unwrap();
    let drawn = back.texts.iter().find(|t| t.block == "owner").unwrap();
    assert_eq!(owner.rect.mirrored_x(), drawn.rect);

    // One through-cut: every output carries it at the same place.
    let solid = build.solid();
    assert_eq!(front.slit, back.slit);
    assert_eq!(back.slit.rect, build.computed.slit);
    assert_eq!(solid.slit, back.slit);
    assert_eq!(front.outline, back.outline);
}

#[test]
fn invariant_fabricated_back_clears_slit_and_pocket() {
    let config = clear_config();
    let report = validate(&config);
    assert!(report.valid, "{}", report.summary());
    assert!(report.warnings.is_empty());

    let pipeline = TagPipeline::new(config.clone(), BuildOptions::default());
    let build = pipeline.build(&finder_like_grid(29), &sample_requests()).unwrap();
    let vector = build.vector();
    let back = vector.groups.iter().find(|g| g.face == Face::Back).unwrap();
    assert!(back.mirrored);

    let envelope = build.computed.slit.grow(config.material.min_wall);
    let pocket = back.nfc.unwrap();
    assert_eq!(pocket.center, Point::new(-40.0, 0.0));
    assert_eq!(build.solid().nfc.unwrap().center, pocket.center);
    assert!(vector.groups.iter().filter(|g| g.face == Face::Front).all(|g| g.nfc.is_none()));

    let fabricated = back.modules.iter().map(|m| m.rect).chain(back.texts.iter().map(|t| t.rect));
    for rect in fabricated {
        assert!(envelope.penetration(&rect).is_none(), "{rect:?} reaches into the slit wall");
        assert!(pocket.penetration(&rect).is_none(), "{rect:?} lands on the NFC pocket");
    }
    assert!(vector.to_svg().contains(r#"id="back-nfc-recess""#));

    // The pocket reads at x = +40 on the mirrored back.
    let over_pocket = back_block("over-pocket", &["NFC"], Rect::from_center(Point::new(40.0, 0.0), 20.0, 8.0));
    match pipeline.build(&finder_like_grid(29), &[over_pocket]).unwrap_err() {
        BuildError::Placement(v) => {
            assert_eq!(v.block, "over-pocket");
            assert!(matches!(v.kind, PlacementViolationKind::KeepOutOverlap { ref keep_out, .. } if keep_out == NFC_KEEP_OUT));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invariant_block_lines_stay_in_region() {
    let config = scenario_a_config();
    let area = compute_layout(&config).text_area;
    let region = Rect::from_edges(area.left, area.top - 5.0, area.left + 60.0, area.top);
    let request = back_block("owner", &["Jane Doe", "+1 555 0100", "jane@example.org", "Berlin"], region);

    let err = TagPipeline::new(config, BuildOptions::default())
        .build(&finder_like_grid(29), &[request])
        .unwrap_err();
    match err {
        BuildError::Placement(v) => {
            assert_eq!(v.block, "owner");
            assert_eq!(v.line, Some(1));
            assert!(matches!(v.kind, PlacementViolationKind::OutsideRegion { axis: Axis::Y, .. }));
            assert!(v.required_space().is_some_and(|s| s > 0.0));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invariant_canonical_face_swap_moves_mirror() {
    let options = BuildOptions {
        canonical_face: Face::Back,
        ..BuildOptions::default()
    };
    let build = TagPipeline::new(scenario_a_config(), options)
        .build(&finder_like_grid(29), &sample_requests())
        .unwrap();
    let vector = build.vector();
    assert!(vector.groups[0].mirrored);
    assert!(!vector.groups[1].mirrored);
    assert_eq!(build.stacking.top_side.face, Face::Back);
}

#[test]
fn invariant_placements_contained_and_disjoint() {
    let build = build_a();
    let area = build.computed.text_area;

    for p in &build.placements {
        assert!(area.contains_rect(&p.rect), "{} escapes the text area", p.block);
        for k in build.keep_outs.iter().filter(|k| k.scope.covers(p.face)) {
            assert!(k.penetration(&p.rect).is_none(), "{} overlaps {}", p.block, k.name);
        }
    }
    for (i, a) in build.placements.iter().enumerate() {
        for b in build.placements.iter().skip(i + 1).filter(|b| b.face == a.face) {
            assert!(a.rect.penetration(&b.rect).is_none());
        }
    }
}

#[test]
fn invariant_document_reloads_with_same_digest() {
    let build = build_a();
    let json = build.document.to_canonical_json().unwrap();
    let reloaded = ExportDocument::from_json(&json).unwrap();
    reloaded.check_compatible().unwrap();
    assert_eq!(reloaded.digest().unwrap(), build.digest().unwrap());

    let mut future = reloaded;
    future.meta.version = "2.0.0".to_string();
    assert!(matches!(
        future.check_compatible(),
        Err(ExportError::IncompatibleVersion { .. })
    ));
}

#[test]
fn invariant_document_has_fixed_sections() {
    let json = build_a().document.to_canonical_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, ["computed", "input", "meta", "placements", "qr", "stacking"]);
    assert_eq!(value["meta"]["generatedAt"], "1970-01-01T00:00:00Z");
}

#[test]
fn invariant_svg_carries_all_layers() {
    let svg = build_a().vector().to_svg();
    for face in ["front", "back"] {
        for layer in ["base-outline", "qr-modules", "text-features", "slit-cutout"] {
            assert!(svg.contains(&format!(r#"id="{face}-{layer}""#)), "missing {face}-{layer}");
        }
    }
    assert!(svg.contains(r#"data-text="jane@example.org""#));
}

#[test]
fn invariant_solid_parameters_follow_stacking() {
    let build = build_a();
    let solid = build.solid();
    assert_eq!(solid.faces.len(), 2);
    let bed = solid.faces.iter().find(|f| f.mirrored).unwrap();
    assert_eq!(bed.z_range[0], 0.0);
    assert!((bed.feature_depth - 1.3).abs() < 1e-9);
    assert_eq!(bed.modules.len(), build.grid.dark_count());
    assert_eq!(solid.color_switch_layer, color_switch_layer_index(0.5, 0.2));
    assert!(solid.color_switch_layer >= 1);
    assert_eq!(solid.slit.rect, build.computed.slit);
}

#[cfg(feature = "test-hooks")]
#[test]
fn invariant_build_always_validates() {
    use dualtag_core::pipeline::get_validation_call_count;

    let before = get_validation_call_count();
    let _ = build_a();
    assert!(get_validation_call_count() > before);

    let before = get_validation_call_count();
    let bad = TagConfig { module_size: 6.0, ..scenario_a_config() };
    assert!(TagPipeline::new(bad, BuildOptions::default())
        .build(&finder_like_grid(29), &[])
        .is_err());
    assert!(get_validation_call_count() > before);
}
