use crate::{
    Result,
    constants::{
        BENTO_PRICE, DEFAULT_CURRENCY, DEFAULT_LABEL, KNOWN_LABELS, MAX_LABEL_LENGTH,
        RICE_BOWL_PRICE,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Monotonic point in time, in milliseconds since the controller booted.
///
/// The state machine never reads a clock; the driver samples one and hands
/// the value in, which keeps every transition reproducible in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Boot time.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from milliseconds since boot.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Milliseconds since boot.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero when
    /// `earlier` lies in the future.
    #[must_use]
    pub fn millis_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Timestamp `millis` later than this one.
    #[must_use]
    pub fn plus_millis(self, millis: u64) -> Self {
        Timestamp(self.0.saturating_add(millis))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "t+{}ms", self.0)
    }
}

/// Classification label of an item placed on the tray.
///
/// Labels are normalized on construction (trimmed, lowercased) and restricted
/// to ASCII letters, digits, `-` and `_`, so they can be compared directly
/// against the price table and printed on the LCD.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemLabel(String);

impl ItemLabel {
    /// Create a label with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidLabel` if the normalized label is empty, longer
    /// than `MAX_LABEL_LENGTH`, or contains characters other than ASCII
    /// alphanumerics, `-` and `_`.
    pub fn new(label: &str) -> Result<Self> {
        let label = label.trim().to_ascii_lowercase();

        if label.is_empty() {
            return Err(Error::InvalidLabel("label is empty".to_string()));
        }

        if label.len() > MAX_LABEL_LENGTH {
            return Err(Error::InvalidLabel(format!(
                "label must be at most {MAX_LABEL_LENGTH} bytes, got {}",
                label.len()
            )));
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidLabel(format!(
                "label contains unsupported characters: {label}"
            )));
        }

        Ok(ItemLabel(label))
    }

    /// The placeholder label held before any classification is committed.
    #[must_use]
    pub fn unknown() -> Self {
        ItemLabel(DEFAULT_LABEL.to_string())
    }

    /// Returns `true` if this is the placeholder label.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.0 == DEFAULT_LABEL
    }

    /// Get the label as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Upper-case form printed on the LCD.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl Default for ItemLabel {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for ItemLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ItemLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ItemLabel::new(s)
    }
}

impl TryFrom<String> for ItemLabel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        ItemLabel::new(&value)
    }
}

impl From<ItemLabel> for String {
    fn from(label: ItemLabel) -> Self {
        label.0
    }
}

/// Set of labels accepted from the classification channel.
///
/// Payloads that do not match an entry are dropped before they reach the
/// mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: BTreeSet<ItemLabel>,
}

impl LabelSet {
    /// Build a label set from raw strings.
    ///
    /// # Errors
    /// Returns `Error::InvalidLabel` if any entry is not a valid label, and
    /// `Error::Config` if the set would be empty.
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels = labels
            .into_iter()
            .map(|label| ItemLabel::new(label.as_ref()))
            .collect::<Result<BTreeSet<_>>>()?;

        if labels.is_empty() {
            return Err(Error::Config("label set must not be empty".to_string()));
        }

        Ok(Self { labels })
    }

    /// Returns `true` if `label` is part of the set.
    #[must_use]
    pub fn contains(&self, label: &ItemLabel) -> bool {
        self.labels.contains(label)
    }

    /// Match a raw inbound payload against the set.
    ///
    /// Returns `None` for payloads that are not UTF-8, not a valid label, or
    /// not in the set.
    #[must_use]
    pub fn match_payload(&self, payload: &[u8]) -> Option<ItemLabel> {
        let text = std::str::from_utf8(payload).ok()?;
        let label = ItemLabel::new(text).ok()?;
        self.labels.contains(&label).then_some(label)
    }

    /// Number of labels in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always `false`; an empty set cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterate over the labels in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &ItemLabel> {
        self.labels.iter()
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            labels: KNOWN_LABELS
                .iter()
                .map(|label| ItemLabel(label.to_string()))
                .collect(),
        }
    }
}

/// A classification result as delivered by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationUpdate {
    /// Classified item.
    pub label: ItemLabel,

    /// When the update reached the mailbox.
    pub received_at: Timestamp,
}

impl ClassificationUpdate {
    /// Create a new update.
    #[must_use]
    pub fn new(label: ItemLabel, received_at: Timestamp) -> Self {
        Self { label, received_at }
    }

    /// Returns `true` if the update carries a real classification.
    #[must_use]
    pub fn is_detection(&self) -> bool {
        !self.label.is_unknown()
    }
}

/// Price in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Price(u64);

impl Price {
    /// Create a price from minor currency units.
    #[must_use]
    pub const fn from_minor(amount: u64) -> Self {
        Price(amount)
    }

    /// Amount in minor currency units.
    #[must_use]
    pub const fn as_minor(self) -> u64 {
        self.0
    }

    /// Render the price with a currency prefix, e.g. `Rp10000`.
    #[must_use]
    pub fn format_with(self, currency: &str) -> String {
        format!("{currency}{}", self.0)
    }
}

/// Static mapping from item label to price.
///
/// # Examples
///
/// ```
/// use tapngo_core::{ItemLabel, Price, PriceTable};
///
/// let table = PriceTable::default();
/// let bento = ItemLabel::new("bento").unwrap();
/// assert_eq!(table.price_of(&bento).unwrap(), Price::from_minor(10_000));
/// assert!(table.price_of(&ItemLabel::unknown()).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    currency: String,
    prices: BTreeMap<ItemLabel, Price>,
}

impl PriceTable {
    /// Create an empty table with the given currency prefix.
    #[must_use]
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            prices: BTreeMap::new(),
        }
    }

    /// Add or replace the price of `label`.
    #[must_use]
    pub fn with_price(mut self, label: ItemLabel, price: Price) -> Self {
        self.prices.insert(label, price);
        self
    }

    /// Look up the price of `label`.
    ///
    /// # Errors
    /// Returns `Error::PriceUnavailable` if the label has no entry.
    pub fn price_of(&self, label: &ItemLabel) -> Result<Price> {
        self.prices
            .get(label)
            .copied()
            .ok_or_else(|| Error::PriceUnavailable {
                label: label.to_string(),
            })
    }

    /// Currency prefix used when rendering prices.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Number of priced items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Returns `true` if no item is priced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        PriceTable::new(DEFAULT_CURRENCY)
            .with_price(ItemLabel("bento".to_string()), Price(BENTO_PRICE))
            .with_price(ItemLabel("rice-bowl".to_string()), Price(RICE_BOWL_PRICE))
    }
}
