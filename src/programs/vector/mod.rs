mod vector_translate;

pub use vector_translate::{
    vector_translate, vector_translate_with_summary, AccessMode, GeometryOp, LayerPlan,
    VectorTranslateOptions, VectorTranslatePlan, VectorTranslateSummary,
};
