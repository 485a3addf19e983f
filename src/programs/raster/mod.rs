mod translate;

pub use translate::{
    translate, translate_with_progress, NoDataOption, TranslateOptions, TranslatePlan,
};
