//! Client tests against a mock pcsc-lite daemon

mod common;

use common::{CARD_HANDLE, CONTEXT_ID, MockDaemon, Reply, init_tracing, reader};
use smartcard_pcsc::apdu::{CardTransport, Command, StatusWord};
use smartcard_pcsc::protocol::layout::{
    ConnectStruct, DisconnectStruct, TransmitStruct, VersionStruct,
};
use smartcard_pcsc::{
    ClientConfig, CommandCode, Context, Disposition, Error, PcscLiteClient, Protocol, Protocols,
    ResourceManager, ResultCode, Scope, ShareMode,
};

const ATR: [u8; 2] = [0x3B, 0x8F];
const SELECT: &str = "00A404000890725A9E3B1070AA";

fn daemon_with_card() -> MockDaemon {
    MockDaemon::new(vec![reader("Reader 1", 0x30, &ATR)])
}

#[test]
fn test_handshake_establish_and_list() {
    init_tracing();
    let daemon = daemon_with_card();
    let context = daemon.context(ClientConfig::default());

    assert_eq!(context.id().0, CONTEXT_ID);
    let readers = context.list_readers_with_card().unwrap();
    assert_eq!(readers.len(), 1);
    assert_eq!(readers[0].name(), "Reader 1");
    assert_eq!(readers[0].atr().unwrap().as_bytes(), &ATR);

    assert_eq!(
        daemon.commands(),
        vec![
            CommandCode::Version.code(),
            CommandCode::EstablishContext.code(),
            CommandCode::GetReadersState.code(),
        ]
    );
    let version: VersionStruct = daemon.requests(CommandCode::Version)[0].payload_as();
    assert_eq!((version.major, version.minor), (4, 3));
}

#[test]
fn test_powered_without_present_is_not_a_card() {
    let daemon = MockDaemon::new(vec![
        reader("Reader 1", 0x20, &[]),
        reader("Reader 2", 0x02, &[]),
    ]);
    let context = daemon.context(ClientConfig::default());

    assert_eq!(context.list_readers().unwrap().len(), 2);
    assert!(context.list_readers_with_card().unwrap().is_empty());
    assert!(matches!(context.reader("Reader 3"), Err(Error::NoReaderAvailable)));
}

#[test]
fn test_select_round_trip() {
    init_tracing();
    let daemon = daemon_with_card();
    let context = daemon.context(ClientConfig::default());
    let mut card = context.connect_card("Reader 1").unwrap();
    assert_eq!(card.protocol(), Protocol::T1);
    assert_eq!(card.handle().0, CARD_HANDLE);

    daemon.push_reply(Reply::Data(vec![0x90, 0x00]));
    let select = Command::select(hex::decode("90725A9E3B1070AA").unwrap());
    let response = card.transmit_apdu(&select).unwrap();
    assert!(response.data().is_empty());
    assert_eq!(response.status(), StatusWord::new(0x90, 0x00));

    let sent = &daemon.requests(CommandCode::Transmit)[0];
    assert_eq!(hex::encode_upper(&sent.data), SELECT);
    let msg: TransmitStruct = sent.payload_as();
    assert_eq!(msg.card, CARD_HANDLE);
    assert_eq!(msg.send_length, 13);
    assert_eq!(msg.recv_length, 258);
}

#[test]
fn test_refused_transmit_leaves_stream_in_sync() {
    let daemon = daemon_with_card();
    let context = daemon.context(ClientConfig::default());
    let mut card = context.connect_card("Reader 1").unwrap();

    daemon.push_reply(Reply::Refuse(ResultCode::W_REMOVED_CARD));
    let err = card.transmit(&hex::decode(SELECT).unwrap()).unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol {
            command: CommandCode::Transmit,
            code: ResultCode::W_REMOVED_CARD,
        }
    ));

    // The next exchange still lines up with the daemon's replies
    card.status().unwrap();
    card.disconnect_with(Disposition::UnpowerCard).unwrap();
    let msg: DisconnectStruct = daemon.requests(CommandCode::Disconnect)[0].payload_as();
    assert_eq!(msg.disposition, Disposition::UnpowerCard as u32);
}

#[test]
fn test_connect_unknown_reader() {
    let daemon = daemon_with_card();
    let mut client = PcscLiteClient::from_stream(daemon.spawn());
    let context = client.establish_context(Scope::System).unwrap();

    let err = client
        .connect(context, b"Nope", ShareMode::Shared, Protocols::ANY)
        .unwrap_err();
    assert_eq!(err.result_code(), Some(ResultCode::E_UNKNOWN_READER));
    assert!(!client.is_broken());
}

#[test]
fn test_connect_sends_raw_reader_name() {
    let mut entry = reader("Reader 1", 0x30, &ATR);
    entry.name[7] = 0xFF;
    let daemon = MockDaemon::new(vec![entry]);
    let context = daemon.context(ClientConfig::default());

    let listed = context.list_readers().unwrap();
    assert_eq!(listed[0].name(), "Reader \u{FFFD}");
    let card = listed[0].connect().unwrap();
    assert_eq!(card.handle().0, CARD_HANDLE);

    let msg: ConnectStruct = daemon.requests(CommandCode::Connect)[0].payload_as();
    assert_eq!(&msg.reader[..9], b"Reader \xFF\0");
}

#[test]
fn test_connect_over_socket_path() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pcscd.comm");
    let daemon = daemon_with_card();
    daemon.listen(&path);

    let context = Context::establish_with_config(ClientConfig::default().with_socket_path(&path))
        .unwrap();
    let reader = context.reader("Reader 1").unwrap();
    assert!(reader.is_card_present());
    context.release().unwrap();

    assert_eq!(
        daemon.commands(),
        vec![
            CommandCode::Version.code(),
            CommandCode::EstablishContext.code(),
            CommandCode::GetReadersState.code(),
            CommandCode::ReleaseContext.code(),
        ]
    );
}

#[test]
fn test_missing_socket_names_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.comm");

    match PcscLiteClient::connect(&path) {
        Err(Error::Connect { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("expected connect error, got {other:?}"),
    }
}

#[test]
fn test_reader_dump() {
    let daemon = daemon_with_card();
    let context = daemon.context(ClientConfig::default());
    let reader = context.reader("Reader 1").unwrap();

    let dump = reader.to_string();
    assert!(dump.contains("Reader 1"));
    assert!(dump.contains("POWERED PRESENT"));
    assert!(dump.contains("3b8f"));
}
