use geo_types::{point, Geometry, Rect};

use crate::errors::GeoError;
use crate::metadata::Metadata;
use crate::spatial_ref::SpatialRef;
use crate::test_utils::mem_poly_dataset;
use crate::vector::{
    Feature, FieldDefn, FieldType, FieldValue, GeometryType, LayerOptions, SpatialFilterPolicy,
};
use crate::DriverManager;


#[test]
fn test_layer_count() {
    let ds = mem_poly_dataset();
    assert_eq!(ds.layer_count(), 1);
    assert_eq!(ds.layer(0).unwrap().name(), "poly");
    assert!(matches!(ds.layer(1), Err(GeoError::LayerNotFound(_))));
}

#[test]
fn test_layer_by_name_ignores_case() {
    let ds = mem_poly_dataset();
    assert_eq!(ds.layer_by_name("POLY").unwrap().name(), "poly");
    assert!(ds.layer_by_name("roads").is_err());
}

#[test]
fn test_iterate_features() {
    let ds = mem_poly_dataset();
    let layer = ds.layer(0).unwrap();
    assert_eq!(layer.feature_count(), 10);
    let fids: Vec<u64> = layer.features().filter_map(Feature::fid).collect();
    assert_eq!(fids, (0..10).collect::<Vec<_>>());
}

#[test]
fn test_field_values() {
    let ds = mem_poly_dataset();
    let layer = ds.layer(0).unwrap();
    let feature = layer.feature(7).unwrap();
    assert_eq!(
        feature.field("EAS_ID").unwrap(),
        Some(FieldValue::Integer64Value(158))
    );
    assert_eq!(
        feature.field("prfedea").unwrap().unwrap().into_string(),
        Some("35043369".to_string())
    );
    crate::assert_near!(
        feature.field("AREA").unwrap().unwrap().into_real().unwrap(),
        1634833.375,
        epsilon = 1e-6
    );
}

#[test]
fn test_field_names_in_order() {
    let ds = mem_poly_dataset();
    let names: Vec<&str> = ds
        .layer(0)
        .unwrap()
        .defn()
        .fields()
        .map(|f| f.name())
        .collect();
    assert_eq!(names, ["AREA", "EAS_ID", "PRFEDEA"]);
}

#[test]
fn test_geometry_type_and_extent() {
    let ds = mem_poly_dataset();
    let layer = ds.layer(0).unwrap();
    assert_eq!(layer.geometry_type(), GeometryType::Polygon);
    let extent = layer.extent().unwrap();
    assert_eq!(extent.min().x, 479000.0);
    assert_eq!(extent.min().y, 4764000.0);
    assert_eq!(extent.max().x, 479980.0);
    assert_eq!(extent.max().y, 4764980.0);
}

#[test]
fn test_attribute_filter() {
    let mut ds = mem_poly_dataset();
    let layer = ds.layer_mut(0).unwrap();
    layer.set_attribute_filter("EAS_ID > 170").unwrap();
    assert_eq!(layer.attribute_filter(), Some("EAS_ID > 170"));
    assert_eq!(layer.feature_count(), 4);
    let fids: Vec<u64> = layer.features().filter_map(Feature::fid).collect();
    assert_eq!(fids, [1, 2, 3, 4]);

    // filters never hide features fetched by fid
    assert!(layer.feature(0).is_some());

    layer.clear_attribute_filter();
    assert_eq!(layer.feature_count(), 10);
}

#[test]
fn test_attribute_filter_unknown_field() {
    let mut ds = mem_poly_dataset();
    let layer = ds.layer_mut(0).unwrap();
    let err = layer.set_attribute_filter("POPULATION > 5").unwrap_err();
    assert!(matches!(err, GeoError::UnknownField { ref field, .. } if field == "POPULATION"));
    assert!(layer.attribute_filter().is_none());
}

#[test]
fn test_spatial_filter() {
    let mut ds = mem_poly_dataset();
    let layer = ds.layer_mut(0).unwrap();
    layer.set_spatial_filter_rect(479190.0, 4764190.0, 479390.0, 4764390.0);
    let fids: Vec<u64> = layer.features().filter_map(Feature::fid).collect();
    assert_eq!(fids, [2, 3]);

    layer.clear_spatial_filter();
    assert_eq!(layer.feature_count(), 10);
}

#[test]
fn test_spatial_filter_policy() {
    let mut ds = mem_poly_dataset();
    let layer = ds.layer_mut(0).unwrap();
    // touches the envelope of triangle 1 but not its hypotenuse
    let rect = Geometry::Rect(Rect::new((479150.0, 4764150.0), (479170.0, 4764170.0)));

    layer.set_spatial_filter_with_policy(&rect, SpatialFilterPolicy::Envelope);
    assert_eq!(layer.feature_count(), 1);

    layer.set_spatial_filter_with_policy(&rect, SpatialFilterPolicy::Exact);
    assert_eq!(layer.feature_count(), 0);
}

#[test]
fn test_filters_combine() {
    let mut ds = mem_poly_dataset();
    let layer = ds.layer_mut(0).unwrap();
    layer.set_spatial_filter_rect(479000.0, 4764000.0, 479450.0, 4764450.0);
    layer.set_attribute_filter("AREA < 250000").unwrap();
    let fids: Vec<u64> = layer.features().filter_map(Feature::fid).collect();
    assert_eq!(fids, [0, 1, 4]);
}

#[test]
fn test_create_feature_assigns_fid() {
    let mut ds = mem_poly_dataset();
    let layer = ds.layer_mut(0).unwrap();
    let feature = Feature::new(layer.defn());
    assert_eq!(layer.create_feature(feature).unwrap(), 10);

    let mut feature = Feature::new(layer.defn());
    feature.set_fid(Some(42));
    assert_eq!(layer.create_feature(feature).unwrap(), 42);

    let mut feature = Feature::new(layer.defn());
    feature.set_fid(Some(3));
    assert!(matches!(
        layer.create_feature(feature),
        Err(GeoError::BadArgument(_))
    ));

    let feature = Feature::new(layer.defn());
    assert_eq!(layer.create_feature(feature).unwrap(), 43);
}

#[test]
fn test_set_and_delete_feature() {
    let mut ds = mem_poly_dataset();
    let layer = ds.layer_mut(0).unwrap();
    let mut feature = layer.feature(5).unwrap().clone();
    feature.set_field_string("PRFEDEA", "changed").unwrap();
    layer.set_feature(feature).unwrap();
    assert_eq!(
        layer.feature(5).unwrap().field("PRFEDEA").unwrap(),
        Some(FieldValue::StringValue("changed".to_string()))
    );

    layer.delete_feature(5).unwrap();
    assert!(layer.feature(5).is_none());
    assert_eq!(layer.feature_count(), 9);
    assert!(matches!(
        layer.delete_feature(5),
        Err(GeoError::FeatureNotFound { fid: 5, .. })
    ));

    let mut orphan = Feature::new(layer.defn());
    orphan.set_fid(Some(5));
    assert!(layer.set_feature(orphan).is_err());
}

#[test]
fn test_create_field_extends_existing_features() {
    let mut ds = mem_poly_dataset();
    let layer = ds.layer_mut(0).unwrap();
    layer
        .create_field(FieldDefn::new("NAME", FieldType::String))
        .unwrap();
    let feature = layer.feature(0).unwrap();
    assert_eq!(feature.field_count(), 4);
    assert_eq!(feature.field("NAME").unwrap(), None);
    assert_eq!(
        feature.field("EAS_ID").unwrap(),
        Some(FieldValue::Integer64Value(168))
    );
    assert!(layer
        .create_field(FieldDefn::new("name", FieldType::Integer))
        .is_err());
}

#[test]
fn test_create_layer() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut ds = driver.create_vector_only("").unwrap();
    let srs = SpatialRef::from_epsg(4326).unwrap();
    let layer = ds
        .create_layer(LayerOptions {
            name: "points",
            srs: Some(&srs),
            ty: GeometryType::Point,
            options: Some(&["ENCODING=UTF-8"]),
        })
        .unwrap();
    assert_eq!(layer.creation_option("encoding"), Some("UTF-8"));
    let mut feature = Feature::new(layer.defn());
    feature.set_geometry(Geometry::Point(point!(x: 26.1, y: 44.4)));
    layer.create_feature(feature).unwrap();

    let layer = ds.layer_by_name("points").unwrap();
    assert_eq!(layer.spatial_ref().and_then(|s| s.epsg_code()), Some(4326));
    assert_eq!(layer.feature_count(), 1);

    assert!(matches!(
        ds.create_layer(LayerOptions {
            name: "POINTS",
            ..Default::default()
        }),
        Err(GeoError::CreateFailed { .. })
    ));
}

#[test]
fn test_create_layer_bad_option() {
    let driver = DriverManager::get_driver_by_name("MEM").unwrap();
    let mut ds = driver.create_vector_only("").unwrap();
    let result = ds.create_layer(LayerOptions {
        name: "points",
        options: Some(&["NOT_A_PAIR"]),
        ..Default::default()
    });
    assert!(matches!(result, Err(GeoError::InvalidOption { .. })));
    assert_eq!(ds.layer_count(), 0);
}

#[test]
fn test_delete_layer() {
    let mut ds = mem_poly_dataset();
    let layer = ds.delete_layer(0).unwrap();
    assert_eq!(layer.name(), "poly");
    assert_eq!(ds.layer_count(), 0);
    assert!(ds.delete_layer(0).is_err());
}

#[test]
fn test_layer_metadata() {
    let mut ds = mem_poly_dataset();
    let layer = ds.layer_mut(0).unwrap();
    layer.set_metadata_item("SOURCE", "survey", "").unwrap();
    assert_eq!(layer.metadata_item("SOURCE", ""), Some("survey".to_string()));
    assert_eq!(layer.metadata_domains(), vec![String::new()]);
}
