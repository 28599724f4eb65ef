// ═══════════════════════════════════════════════════════════════════
// Export Tests: CSV and JSON export/import
// ═══════════════════════════════════════════════════════════════════

mod common;

use common::d;
use trade_journal_core::errors::CoreError;
use trade_journal_core::models::purchase::StockPurchase;
use trade_journal_core::models::trade::{Exit, Trade};
use trade_journal_core::services::export_service::ExportService;

fn closed_trade() -> Trade {
    let mut trade = Trade::long("AAPL", d(2025, 1, 2), 100.0, 10.0)
        .with_strategy("Breakout")
        .with_notes("Entry on volume, then \"chased\", oops");
    trade.exits.push(Exit::new(d(2025, 1, 10), 110.0, 4.0));
    trade.exits.push(Exit::new(d(2025, 1, 20), 105.0, 6.0).with_fees(1.0));
    trade
}

mod csv_export {
    use super::*;

    #[test]
    fn trades_csv_has_derived_columns() {
        let csv = ExportService::new().trades_to_csv(&[closed_trade()]).unwrap();
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("id,symbol,side,entry_date"));
        assert!(header.contains("status"));
        assert!(header.contains("realized_pnl"));

        let row = lines.next().unwrap();
        assert!(row.contains(",AAPL,Long,2025-01-02,"));
        assert!(row.contains(",Closed,"));
        // quoted because of the comma and the inner quotes
        assert!(row.contains("\"Entry on volume, then \"\"chased\"\", oops\""));
        assert!(lines.next().is_none());
    }

    #[test]
    fn exits_csv_has_one_row_per_exit() {
        let csv = ExportService::new()
            .exits_to_csv(&[closed_trade(), Trade::long("MSFT", d(2025, 1, 2), 400.0, 1.0)])
            .unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().nth(1).unwrap().contains("2025-01-10"));
    }

    #[test]
    fn empty_collections() {
        let svc = ExportService::new();
        assert!(svc.trades_to_csv(&[]).unwrap().is_empty());
        assert!(svc.purchases_to_csv(&[]).unwrap().is_empty());
    }
}

mod purchase_csv {
    use super::*;

    #[test]
    fn parses_rows_with_optional_columns() {
        let data = "symbol,name,date,price,quantity,fees,notes\n\
                    AAPL,Apple Inc.,2025-01-02,100.5,10,1.5,first lot\n\
                    msft,,2025-01-03,200,2,,\n";
        let purchases = ExportService::new().purchases_from_csv(data).unwrap();

        assert_eq!(purchases.len(), 2);
        assert_eq!(purchases[0].name.as_deref(), Some("Apple Inc."));
        assert_eq!(purchases[0].fees, 1.5);
        assert_eq!(purchases[0].notes.as_deref(), Some("first lot"));
        assert_eq!(purchases[1].symbol, "MSFT");
        assert_eq!(purchases[1].name, None);
        assert_eq!(purchases[1].fees, 0.0);
        assert_eq!(purchases[1].notes, None);
    }

    #[test]
    fn reports_bad_row_number() {
        let data = "symbol,name,date,price,quantity,fees,notes\n\
                    AAPL,,2025-01-02,100,1,,\n\
                    MSFT,,not-a-date,200,2,,\n";
        match ExportService::new().purchases_from_csv(data) {
            Err(CoreError::Csv(msg)) => assert!(msg.contains("row 3"), "{msg}"),
            other => panic!("expected CSV error, got {other:?}"),
        }
    }

    #[test]
    fn exported_csv_reimports() {
        let svc = ExportService::new();
        let original = vec![
            StockPurchase::new("VTI", d(2025, 2, 3), 250.0, 4.0)
                .with_name("Vanguard Total Market")
                .with_fees(1.0),
        ];
        let parsed = svc.purchases_from_csv(&svc.purchases_to_csv(&original).unwrap()).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].symbol, "VTI");
        assert_eq!(parsed[0].purchase_date, d(2025, 2, 3));
        assert_eq!(parsed[0].cost_basis(), original[0].cost_basis());
        assert_ne!(parsed[0].id, original[0].id);
    }
}

mod json {
    use super::*;

    #[test]
    fn trades_json_keeps_exits_and_ids() {
        let svc = ExportService::new();
        let trade = closed_trade();
        let parsed = svc.trades_from_json(&svc.trades_to_json(&[trade.clone()]).unwrap()).unwrap();
        assert_eq!(parsed, vec![trade]);
    }

    #[test]
    fn invalid_json() {
        let result = ExportService::new().purchases_from_json("{not json");
        assert!(matches!(result, Err(CoreError::Deserialization(_))));
    }
}
