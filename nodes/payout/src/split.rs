use {
    chain_api::{AccountId, Balance, Transfer},
    std::{fmt, str::FromStr},
};

/// Denominator of [`Share`], parts per million of the whole balance.
pub const SHARE_SCALE: u32 = 1_000_000;
/// Fractional digits a percentage may carry, `SHARE_SCALE / 100 == 10^SHARE_DECIMALS`.
pub const SHARE_DECIMALS: usize = 4;
const PERCENT: u32 = SHARE_SCALE / 100;

/// Portion of the balance sent to the main destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Share(u32);

impl Share {
    pub const ALL: Self = Self(SHARE_SCALE);

    pub fn from_ppm(ppm: u32) -> Option<Self> {
        (ppm <= Self::ALL.0).then_some(Self(ppm))
    }

    /// `floor(amount * share)` without overflowing.
    pub fn of(self, amount: Balance) -> Balance {
        let scale = SHARE_SCALE as Balance;
        let share = self.0 as Balance;
        amount / scale * share + amount % scale * share / scale
    }
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (whole, frac) = (self.0 / PERCENT, self.0 % PERCENT);
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let frac = format!("{frac:0width$}", width = SHARE_DECIMALS);
        write!(f, "{whole}.{}", frac.trim_end_matches('0'))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ShareError {
    #[error("not a decimal number: {0:?}")]
    NotANumber(String),
    #[error("more than {SHARE_DECIMALS} decimal places: {0:?}")]
    TooPrecise(String),
    #[error("must be between 0 and 100: {0:?}")]
    OutOfRange(String),
}

impl FromStr for Share {
    type Err = ShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.len() + frac.len() == 0 || !is_digits(whole) || !is_digits(frac) {
            return Err(ShareError::NotANumber(s.into()));
        }

        if frac.len() > SHARE_DECIMALS {
            return Err(ShareError::TooPrecise(s.into()));
        }

        let whole = match whole.trim_start_matches('0') {
            "" => 0,
            w if w.len() > 3 => return Err(ShareError::OutOfRange(s.into())),
            w => w.parse::<u32>().map_err(|_| ShareError::NotANumber(s.into()))?,
        };
        let frac = match frac {
            "" => 0,
            f => {
                let padded = format!("{f:0<width$}", width = SHARE_DECIMALS);
                padded.parse::<u32>().map_err(|_| ShareError::NotANumber(s.into()))?
            }
        };

        let ppm = whole * PERCENT + frac;
        if negative && ppm != 0 {
            return Err(ShareError::OutOfRange(s.into()));
        }
        Self::from_ppm(ppm).ok_or_else(|| ShareError::OutOfRange(s.into()))
    }
}

/// Split of a free balance, all amounts in base units. `main + dust == balance` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPlan {
    pub balance: Balance,
    pub main: Balance,
    pub dust: Balance,
    pub decimals: u8,
}

impl TransferPlan {
    pub fn new(balance: Balance, decimals: u8, share: Share) -> Self {
        let main = share.of(balance);
        Self {
            balance,
            main,
            dust: balance - main,
            decimals,
        }
    }

    pub fn decimal_balance(&self) -> f64 {
        to_decimal(self.balance, self.decimals)
    }

    pub fn main_amount(&self) -> f64 {
        to_decimal(self.main, self.decimals)
    }

    pub fn dust_amount(&self) -> f64 {
        to_decimal(self.dust, self.decimals)
    }

    /// Names of the destinations that would receive less than `existential_deposit`.
    pub fn below_existential_deposit(&self, existential_deposit: Balance) -> Vec<&'static str> {
        [("main", self.main), ("dust", self.dust)]
            .into_iter()
            .filter(|&(_, amount)| amount < existential_deposit)
            .map(|(name, _)| name)
            .collect()
    }

    /// The main destination gets the computed amount, the dust destination gets whatever is
    /// left, the payout account is allowed to be reaped.
    pub fn transfers(&self, main: AccountId, dust: AccountId) -> Vec<Transfer> {
        vec![
            Transfer::Amount {
                dest: main,
                amount: self.main,
            },
            Transfer::All {
                dest: dust,
                keep_alive: false,
            },
        ]
    }
}

/// Display only, precision is lost for large amounts.
pub fn to_decimal(amount: Balance, decimals: u8) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

/// Exact decimal rendering of base units, trailing zeros trimmed.
pub fn format_units(amount: Balance, decimals: u8) -> String {
    let decimals = decimals as usize;
    let digits = format!("{amount:0>width$}", width = decimals + 1);
    let (whole, frac) = digits.split_at(digits.len() - decimals);
    match frac.trim_end_matches('0') {
        "" => whole.to_owned(),
        frac => format!("{whole}.{frac}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn share(s: &str) -> Share {
        s.parse().unwrap()
    }

    fn ppm(ppm: u32) -> Share {
        Share::from_ppm(ppm).unwrap()
    }

    fn from_decimal(value: f64, decimals: u8) -> Balance {
        (value * 10f64.powi(decimals as i32)).round() as Balance
    }

    #[test]
    fn reference_split() {
        let plan = TransferPlan::new(1_000_000_000_000, 12, share("70"));
        assert_eq!(plan.decimal_balance(), 1.0);
        assert_eq!(plan.main_amount(), 0.7);
        assert_eq!(plan.dust_amount(), 0.3);
        assert_eq!(plan.main, 700_000_000_000);
        assert_eq!(plan.dust, 300_000_000_000);
    }

    #[test]
    fn parts_add_up() {
        let balances = [
            0,
            1,
            7,
            999_999,
            1_000_001,
            123_456_789_012_345,
            u64::MAX as Balance,
            Balance::MAX / 3,
            Balance::MAX,
        ];
        let shares = ["0", "0.0001", "1", "33.3333", "50", "66.6667", "99.9999", "100"];
        for balance in balances {
            for s in shares {
                let plan = TransferPlan::new(balance, 10, share(s));
                assert_eq!(plan.main + plan.dust, balance, "{balance} {s}");
                assert!(plan.main <= balance);

                let sum = plan.main_amount() + plan.dust_amount();
                let tolerance = plan.decimal_balance() * 1e-12;
                assert!((sum - plan.decimal_balance()).abs() <= tolerance, "{balance} {s}");
            }
        }
    }

    #[test]
    fn full_and_empty_shares() {
        let plan = TransferPlan::new(5_000, 3, Share::ALL);
        assert_eq!((plan.main, plan.dust), (5_000, 0));
        assert_eq!(plan.dust_amount(), 0.0);

        let plan = TransferPlan::new(5_000, 3, ppm(0));
        assert_eq!((plan.main, plan.dust), (0, 5_000));
        assert_eq!(plan.main_amount(), 0.0);
    }

    #[test]
    fn share_is_floored() {
        assert_eq!(share("33.3333").of(10), 3);
        assert_eq!(share("50").of(3), 1);
        assert_eq!(share("100").of(Balance::MAX), Balance::MAX);
        assert_eq!(share("50").of(Balance::MAX), Balance::MAX / 2);
    }

    #[test]
    fn parse_share() {
        assert_eq!(share("70"), ppm(700_000));
        assert_eq!(share(" 70.5 "), ppm(705_000));
        assert_eq!(share("0.0001"), ppm(1));
        assert_eq!(share("100.0000"), ppm(SHARE_SCALE));
        assert_eq!(share(".5"), ppm(5_000));
        assert_eq!(share("007"), ppm(70_000));
        assert_eq!(share("-0"), ppm(0));

        for bad in ["", ".", "abc", "1e2", "5%", "1.2.3", "--1"] {
            assert!(matches!(bad.parse::<Share>(), Err(ShareError::NotANumber(_))), "{bad}");
        }
        for bad in ["100.0001", "101", "-1", "-0.5", "99999999999"] {
            assert!(matches!(bad.parse::<Share>(), Err(ShareError::OutOfRange(_))), "{bad}");
        }
        assert!(matches!(
            "1.23456".parse::<Share>(),
            Err(ShareError::TooPrecise(_))
        ));
    }

    #[test]
    fn display_share() {
        assert_eq!(share("70").to_string(), "70");
        assert_eq!(share("33.3300").to_string(), "33.33");
        assert_eq!(share("0.0001").to_string(), "0.0001");
    }

    #[test]
    fn existential_deposit_check() {
        let plan = TransferPlan::new(1_000_000_000_000, 12, share("50"));
        assert_eq!(
            plan.below_existential_deposit(1_000_000_000_000),
            ["main", "dust"]
        );
        assert!(plan.below_existential_deposit(500_000_000_000).is_empty());

        let plan = TransferPlan::new(1_000, 0, Share::ALL);
        assert_eq!(plan.below_existential_deposit(1), ["dust"]);
    }

    #[test]
    fn decimal_round_trip() {
        let cases = [
            (0, 12),
            (1, 12),
            (1_234_567_890_123, 12),
            (42, 0),
            (10_000_000_000, 10),
        ];
        for (amount, decimals) in cases {
            assert_eq!(from_decimal(to_decimal(amount, decimals), decimals), amount);
        }
    }

    #[test]
    fn exact_units() {
        assert_eq!(format_units(1_000_000_000_000, 12), "1");
        assert_eq!(format_units(700_000_000_000, 12), "0.7");
        assert_eq!(format_units(1, 12), "0.000000000001");
        assert_eq!(format_units(0, 12), "0");
        assert_eq!(format_units(12_345, 0), "12345");
        assert_eq!(
            format_units(Balance::MAX, 18),
            "340282366920938463463.374607431768211455"
        );
    }
}
