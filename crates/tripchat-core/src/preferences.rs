//! Trip preferences sent along with every question, plus currency handling.

use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

pub const MIN_TRAVELERS: u8 = 1;
pub const MAX_TRAVELERS: u8 = 10;
/// Default length of a round trip, in days.
pub const DEFAULT_TRIP_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    #[default]
    RoundTrip,
    OneWay,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::RoundTrip => "roundtrip",
            TripType::OneWay => "oneway",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TripType::RoundTrip => "Round trip",
            TripType::OneWay => "One way",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            TripType::RoundTrip => TripType::OneWay,
            TripType::OneWay => TripType::RoundTrip,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Budget {
    #[default]
    Any,
    Budget,
    Moderate,
    Luxury,
}

impl Budget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Budget::Any => "any",
            Budget::Budget => "budget",
            Budget::Moderate => "moderate",
            Budget::Luxury => "luxury",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Budget::Any => Budget::Budget,
            Budget::Budget => Budget::Moderate,
            Budget::Moderate => Budget::Luxury,
            Budget::Luxury => Budget::Any,
        }
    }
}

/// Display currency. Prices are stored in INR and converted for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Inr,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub fn all() -> [Currency; 4] {
        [Currency::Inr, Currency::Usd, Currency::Eur, Currency::Gbp]
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Inr => "₹",
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(code))
    }

    pub fn next(&self) -> Self {
        let all = Self::all();
        let idx = all.iter().position(|c| c == self).unwrap_or(0);
        all[(idx + 1) % all.len()]
    }

    fn rate_from_inr(&self) -> f64 {
        match self {
            Currency::Inr => 1.0,
            Currency::Usd => 0.012,
            Currency::Eur => 0.011,
            Currency::Gbp => 0.0095,
        }
    }

    /// Convert an INR amount, rounded to whole units.
    pub fn convert_from_inr(&self, amount_inr: u64) -> u64 {
        (amount_inr as f64 * self.rate_from_inr()).round() as u64
    }

    /// `₹45,000`, `$540`. INR uses lakh grouping (`₹1,20,000`).
    pub fn format_price(&self, amount_inr: u64) -> String {
        let amount = self.convert_from_inr(amount_inr);
        format!("{}{}", self.symbol(), group_digits(amount, *self == Currency::Inr))
    }
}

fn group_digits(amount: u64, indian: bool) -> String {
    let digits = amount.to_string();
    if digits.len() <= 3 {
        return digits;
    }
    let (head, last3) = digits.split_at(digits.len() - 3);
    let group = if indian { 2 } else { 3 };

    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(group);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{}", groups.join(","), last3)
}

/// A suggested destination with its starting price in INR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub name: &'static str,
    pub price_inr: u64,
}

impl Destination {
    pub fn prompt(&self) -> String {
        format!("Plan a trip to {}", self.name)
    }
}

pub const DESTINATIONS: [Destination; 6] = [
    Destination { name: "Bali", price_inr: 45_000 },
    Destination { name: "Paris", price_inr: 85_000 },
    Destination { name: "Maldives", price_inr: 120_000 },
    Destination { name: "Switzerland", price_inr: 150_000 },
    Destination { name: "Dubai", price_inr: 35_000 },
    Destination { name: "Tokyo", price_inr: 95_000 },
];

/// Travel options the user sets alongside their question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripPreferences {
    pub travel_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub travelers: u8,
    pub trip_type: TripType,
    pub budget: Budget,
    pub currency: Currency,
}

impl TripPreferences {
    /// Depart tomorrow, return a week later.
    pub fn new(currency: Currency) -> Self {
        Self::starting_on(Local::now().date_naive(), currency)
    }

    pub fn starting_on(today: NaiveDate, currency: Currency) -> Self {
        let travel_date = today.checked_add_days(Days::new(1));
        Self {
            travel_date,
            return_date: travel_date.and_then(|d| d.checked_add_days(Days::new(DEFAULT_TRIP_DAYS))),
            travelers: MIN_TRAVELERS,
            trip_type: TripType::default(),
            budget: Budget::default(),
            currency,
        }
    }

    pub fn adjust_travelers(&mut self, delta: i8) {
        let count = i16::from(self.travelers) + i16::from(delta);
        self.travelers = count.clamp(i16::from(MIN_TRAVELERS), i16::from(MAX_TRAVELERS)) as u8;
    }

    /// Move the departure date; the return date follows a week later.
    pub fn shift_travel_date(&mut self, days: i64) {
        let Some(date) = self.travel_date else { return };
        let shifted = if days >= 0 {
            date.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            date.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        if let Some(date) = shifted {
            self.travel_date = Some(date);
            self.return_date = date.checked_add_days(Days::new(DEFAULT_TRIP_DAYS));
        }
    }

    /// Move the return date, never before departure.
    pub fn shift_return_date(&mut self, days: i64) {
        let Some(date) = self.return_date else { return };
        let shifted = if days >= 0 {
            date.checked_add_days(Days::new(days.unsigned_abs()))
        } else {
            date.checked_sub_days(Days::new(days.unsigned_abs()))
        };
        if let Some(date) = shifted {
            if self.travel_date.map_or(true, |start| date >= start) {
                self.return_date = Some(date);
            }
        }
    }

    /// Suffix appended to the outgoing message.
    pub fn context_suffix(&self) -> String {
        let mut context = Vec::new();
        if let Some(date) = self.travel_date {
            context.push(format!("Travel date: {}", date.format("%Y-%m-%d")));
        }
        if self.trip_type == TripType::RoundTrip {
            if let Some(date) = self.return_date {
                context.push(format!("Return date: {}", date.format("%Y-%m-%d")));
            }
        }
        if self.travelers > 1 {
            context.push(format!("Travelers: {}", self.travelers));
        }
        context.push(format!("Trip type: {}", self.trip_type.as_str()));
        if self.budget != Budget::Any {
            context.push(format!("Budget preference: {}", self.budget.as_str()));
        }
        context.push(format!("Currency: {}", self.currency.code()));

        format!("\n[Travel preferences: {}]", context.join(", "))
    }
}

impl Default for TripPreferences {
    fn default() -> Self {
        Self::new(Currency::default())
    }
}
