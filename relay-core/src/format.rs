//! Human-readable rendering of a [`WeatherSnapshot`].
//!
//! The template is fixed Portuguese text with markdown emphasis; changing the
//! wording is a template edit here, not configuration.

use chrono::{Local, NaiveDateTime};

use crate::model::WeatherSnapshot;

/// `dd/mm/yyyy, HH:MM:SS`, the pt-BR short date-time form.
const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Round to the nearest whole degree, halves away from zero.
///
/// Going through `i64` turns `-0.0` into a plain `0`.
pub fn round_celsius(value: f64) -> i64 {
    value.round() as i64
}

/// Render the snapshot with the current local time as the update stamp.
pub fn format_message(snapshot: &WeatherSnapshot) -> String {
    format_message_at(snapshot, Local::now().naive_local())
}

/// Render the snapshot with an explicit "now".
pub fn format_message_at(snapshot: &WeatherSnapshot, now: NaiveDateTime) -> String {
    format!(
        "🌤️ **Clima em {city}**\n\n\
         🌡️ Temperatura: {temp}°C (Sensação: {feels}°C)\n\
         ☁️ Condição: {condition}\n\
         💧 Umidade: {humidity}%\n\
         💨 Vento: {wind} m/s\n\n\
         _Atualizado em: {stamp}_",
        city = snapshot.city,
        temp = round_celsius(snapshot.temperature_c),
        feels = round_celsius(snapshot.feels_like_c),
        condition = snapshot.condition,
        humidity = snapshot.humidity_pct,
        wind = snapshot.wind_speed_mps,
        stamp = now.format(TIMESTAMP_FORMAT),
    )
}
