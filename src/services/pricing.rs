use crate::models::PrintType;
use rust_decimal::Decimal;

/// Per-page rates, taken from configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRates {
    pub bw: Decimal,
    pub color: Decimal,
}

/// Computes the total price for a print order.
///
/// BOTH is priced as one black & white pass plus one color pass of the
/// whole document, so `quote(Both, ..) == quote(Bw, ..) + quote(Color, ..)`
/// for the same copies and page count. The result is rounded to two
/// decimal places.
pub fn quote(print_type: PrintType, copies: i32, page_count: i32, rates: &PageRates) -> Decimal {
    let pages = Decimal::from(page_count) * Decimal::from(copies);
    let total = match print_type {
        PrintType::Bw => pages * rates.bw,
        PrintType::Color => pages * rates.color,
        PrintType::Both => pages * rates.bw + pages * rates.color,
    };
    total.round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rates() -> PageRates {
        PageRates {
            bw: dec!(2.00),
            color: dec!(10.00),
        }
    }

    #[test]
    fn bw_pricing() {
        assert_eq!(quote(PrintType::Bw, 3, 4, &rates()), dec!(24.00));
    }

    #[test]
    fn color_pricing() {
        assert_eq!(quote(PrintType::Color, 2, 5, &rates()), dec!(100.00));
    }

    #[test]
    fn both_is_sum_of_bw_and_color() {
        for copies in 1..=10 {
            for pages in 1..=5 {
                let bw = quote(PrintType::Bw, copies, pages, &rates());
                let color = quote(PrintType::Color, copies, pages, &rates());
                let both = quote(PrintType::Both, copies, pages, &rates());
                assert_eq!(both, bw + color);
            }
        }
    }

    #[test]
    fn fractional_rates_round_to_two_places() {
        let odd = PageRates {
            bw: dec!(1.333),
            color: dec!(0.777),
        };
        assert_eq!(quote(PrintType::Bw, 1, 1, &odd), dec!(1.33));
        assert_eq!(quote(PrintType::Color, 3, 1, &odd), dec!(2.33));
    }
}
