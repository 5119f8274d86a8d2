//! Survey application: language packs and the intake survey flow.

mod flow;
mod lang;

pub use flow::{
    Field, Mode, SurveyAnswers, SurveyFlow, AGE_KEY, CITY_KEY, CONTACT_KEY, HEALTH_KEY, NAME_KEY,
    REQUEST_KEY,
};
pub use lang::{Labels, LanguagePack, Questions, BUNDLED_PACKS, DEFAULT_LANGUAGE};
