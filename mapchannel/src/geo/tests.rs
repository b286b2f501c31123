use super::*;

fn global_request(ppd: f64) -> GeoRequest {
    GeoRequest::new(
        GeoRect::new(0.0, -90.0, 360.0, 180.0),
        ppd,
        Projection::Equirectangular,
    )
    .unwrap()
}

#[test]
fn test_rect_edges() {
    let rect = GeoRect::new(10.0, -5.0, 20.0, 10.0);
    assert_eq!(rect.max_x(), 30.0);
    assert_eq!(rect.max_y(), 5.0);
    assert_eq!(rect.center(), (20.0, 0.0));
}

#[test]
fn test_rect_from_corners_normalizes() {
    let rect = GeoRect::from_corners(30.0, 5.0, 10.0, -5.0);
    assert_eq!(rect, GeoRect::new(10.0, -5.0, 20.0, 10.0));
}

#[test]
fn test_rect_contains_is_half_open() {
    let rect = GeoRect::new(0.0, 0.0, 10.0, 10.0);
    assert!(rect.contains(0.0, 0.0));
    assert!(rect.contains(9.999, 9.999));
    assert!(!rect.contains(10.0, 5.0));
    assert!(!rect.contains(5.0, 10.0));
}

#[test]
fn test_rect_intersection() {
    let a = GeoRect::new(0.0, 0.0, 10.0, 10.0);
    let b = GeoRect::new(5.0, 5.0, 10.0, 10.0);
    assert_eq!(a.intersection(&b), Some(GeoRect::new(5.0, 5.0, 5.0, 5.0)));

    let c = GeoRect::new(20.0, 20.0, 1.0, 1.0);
    assert_eq!(a.intersection(&c), None);

    // Touching edges do not overlap
    let d = GeoRect::new(10.0, 0.0, 5.0, 5.0);
    assert_eq!(a.intersection(&d), None);
}

#[test]
fn test_rect_union() {
    let a = GeoRect::new(0.0, 0.0, 1.0, 1.0);
    let b = GeoRect::new(4.0, -2.0, 1.0, 1.0);
    assert_eq!(a.union(&b), GeoRect::new(0.0, -2.0, 5.0, 3.0));
}

#[test]
fn test_rect_empty() {
    assert!(GeoRect::new(0.0, 0.0, 0.0, 1.0).is_empty());
    assert!(GeoRect::new(0.0, 0.0, 1.0, -1.0).is_empty());
    assert!(GeoRect::new(0.0, 0.0, f64::INFINITY, 1.0).is_empty());
    assert!(!GeoRect::new(0.0, 0.0, 1.0, 1.0).is_empty());
}

#[test]
fn test_request_dimensions() {
    let request = global_request(2.0);
    assert_eq!(request.width_px(), 720);
    assert_eq!(request.height_px(), 360);
}

#[test]
fn test_request_rejects_bad_resolution() {
    let extent = GeoRect::new(0.0, 0.0, 10.0, 10.0);
    assert!(matches!(
        GeoRequest::new(extent, 0.0, Projection::Equirectangular),
        Err(GeoError::InvalidResolution(_))
    ));
    assert!(matches!(
        GeoRequest::new(extent, f64::NAN, Projection::Equirectangular),
        Err(GeoError::InvalidResolution(_))
    ));
}

#[test]
fn test_request_rejects_empty_extent() {
    let extent = GeoRect::new(0.0, 0.0, 0.0, 10.0);
    assert!(matches!(
        GeoRequest::new(extent, 1.0, Projection::Equirectangular),
        Err(GeoError::InvalidExtent { .. })
    ));
}

#[test]
fn test_request_rejects_subpixel_extent() {
    let extent = GeoRect::new(0.0, 0.0, 0.1, 0.1);
    assert!(matches!(
        GeoRequest::new(extent, 1.0, Projection::Equirectangular),
        Err(GeoError::EmptyRaster { .. })
    ));
}

#[test]
fn test_request_rejects_oversized_raster() {
    let globe = GeoRect::new(0.0, -90.0, 360.0, 180.0);
    match GeoRequest::new(globe, 1e10, Projection::Equirectangular) {
        Err(GeoError::RasterTooLarge {
            width_px,
            height_px,
            max_pixels,
        }) => {
            assert_eq!(width_px, 3.6e12);
            assert_eq!(height_px, 1.8e12);
            assert_eq!(max_pixels, MAX_RASTER_PIXELS);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // Large but finite grids are refused before any allocation
    assert!(matches!(
        GeoRequest::new(globe, 1000.0, Projection::Equirectangular),
        Err(GeoError::RasterTooLarge { .. })
    ));
}

#[test]
fn test_request_at_pixel_limit() {
    // 16384 x 16384 = 2^28 pixels
    let extent = GeoRect::new(0.0, 0.0, 16.0, 16.0);
    let request = GeoRequest::new(extent, 1024.0, Projection::Equirectangular).unwrap();
    assert_eq!(request.width_px(), 16384);
    assert!(GeoRequest::new(extent, 1025.0, Projection::Equirectangular).is_err());
}

#[test]
fn test_pixel_center_world() {
    let request = global_request(1.0);
    assert_eq!(request.pixel_center_world(0, 0), (0.5, 89.5));
    assert_eq!(request.pixel_center_world(359, 179), (359.5, -89.5));
}

#[test]
fn test_world_to_pixel_inverts_pixel_center() {
    let request = global_request(4.0);
    let (x, y) = request.pixel_center_world(17, 42);
    let (px, py) = request.world_to_pixel(x, y);
    assert!((px - 17.5).abs() < 1e-9);
    assert!((py - 42.5).abs() < 1e-9);
}

#[test]
fn test_pixel_rect_full_extent() {
    let request = global_request(1.0);
    let rect = request.pixel_rect(&request.extent()).unwrap();
    assert_eq!(rect, PixelRect::new(0, 0, 360, 180));
}

#[test]
fn test_pixel_rect_rounds_outward() {
    let request = global_request(1.0);
    let rect = request
        .pixel_rect(&GeoRect::new(10.5, 0.25, 2.0, 0.5))
        .unwrap();
    // x: 10.5..12.5 → 10..13, y (from top): 89.25..89.75 → 89..90
    assert_eq!(rect, PixelRect::new(10, 89, 3, 1));
}

#[test]
fn test_pixel_rect_clamps_and_misses() {
    let request = global_request(1.0);
    let rect = request
        .pixel_rect(&GeoRect::new(-10.0, 80.0, 15.0, 20.0))
        .unwrap();
    assert_eq!(rect, PixelRect::new(0, 0, 5, 10));

    assert!(request
        .pixel_rect(&GeoRect::new(400.0, 0.0, 5.0, 5.0))
        .is_none());
}

#[test]
fn test_pixel_rect_to_world_round_trip() {
    let request = global_request(2.0);
    let pixels = PixelRect::new(20, 10, 4, 6);
    let world = request.pixel_rect_to_world(&pixels);
    assert_eq!(world, GeoRect::new(10.0, 82.0, 2.0, 3.0));
    assert_eq!(request.pixel_rect(&world), Some(pixels));
}

#[test]
fn test_equirectangular_is_identity() {
    let projection = Projection::Equirectangular;
    assert_eq!(projection.world_to_spatial(370.0, -95.0), (370.0, -95.0));
    assert_eq!(projection.spatial_to_world(12.0, 34.0), (12.0, 34.0));
}

#[test]
fn test_oblique_center_maps_to_origin() {
    let projection = Projection::oblique(137.4, -4.6);
    let (x, y) = projection.spatial_to_world(137.4, -4.6);
    assert!(x.abs() < 1e-9, "x = {}", x);
    assert!(y.abs() < 1e-9, "y = {}", y);

    let (lon, lat) = projection.world_to_spatial(0.0, 0.0);
    assert!((lon - 137.4).abs() < 1e-9);
    assert!((lat + 4.6).abs() < 1e-9);
}

#[test]
fn test_oblique_round_trip() {
    let projection = Projection::oblique(200.0, 35.0);
    for &(lon, lat) in &[(10.0, 20.0), (359.0, -60.0), (180.0, 0.0), (45.5, 89.0)] {
        let (x, y) = projection.spatial_to_world(lon, lat);
        let (lon2, lat2) = projection.world_to_spatial(x, y);
        assert!((lon2 - lon).abs() < 1e-7, "lon {} -> {}", lon, lon2);
        assert!((lat2 - lat).abs() < 1e-7, "lat {} -> {}", lat, lat2);
    }
}

#[test]
fn test_oblique_with_zero_center_is_identity_modulo_wrap() {
    let projection = Projection::oblique(0.0, 0.0);
    let (lon, lat) = projection.world_to_spatial(-30.0, 15.0);
    assert!((lon - 330.0).abs() < 1e-9);
    assert!((lat - 15.0).abs() < 1e-9);
}

#[test]
fn test_normalize_lon() {
    assert_eq!(normalize_lon(0.0), 0.0);
    assert_eq!(normalize_lon(360.0), 0.0);
    assert_eq!(normalize_lon(-90.0), 270.0);
    assert_eq!(normalize_lon(725.0), 5.0);
    assert!(normalize_lon(-1e-18) < 360.0);
}

#[test]
fn test_projection_serde_tagged() {
    let json = serde_json::to_string(&Projection::oblique(10.0, 20.0)).unwrap();
    assert!(json.contains("\"type\":\"oblique_cylindrical\""));
    let back: Projection = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Projection::oblique(10.0, 20.0));
}
