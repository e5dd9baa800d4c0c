// Market data collaborators: OKX REST client, saved responses, validation
pub mod okx;
pub mod validator;

pub use okx::{
    load_candles_file, parse_candle_row, parse_candles, CandleField, OkxClient, OkxResponse,
};
pub use validator::CandleValidator;
