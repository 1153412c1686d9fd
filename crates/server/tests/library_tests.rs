//! Library outcomes when the object store misbehaves.

mod common;

use bytes::Bytes;
use common::{TestServer, seeded_bytes};
use musicspot_core::{Requester, Song, UploadRequest, UploadedFile, UserId};
use musicspot_server::{DeleteOutcome, LibraryError, UploadOutcome};
use musicspot_storage::{StorageError, WritePosition};

fn request(data: impl Into<Bytes>) -> UploadRequest {
    UploadRequest {
        file: Some(UploadedFile::new(data, "track.wav")),
        title: "Title".to_string(),
        artist: "Artist".to_string(),
        ..Default::default()
    }
}

async fn committed(server: &TestServer, owner: UserId) -> Song {
    match server
        .state
        .library()
        .upload(request(vec![9; 32]), owner)
        .await
        .unwrap()
    {
        UploadOutcome::Committed(song) => song,
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_upload_write_failure_discards_segments() {
    let server = TestServer::with_faulty_storage().await;
    server.faulty.as_ref().unwrap().fail_puts_after(2);

    // Three segments: the third put fails.
    let err = server
        .state
        .library()
        .upload(request(seeded_bytes(3, 600 * 1024)), UserId::new())
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            LibraryError::Storage(StorageError::WriteFailure {
                position: WritePosition::Segment(2),
                ..
            })
        ),
        "{err:?}"
    );

    let chunks = &server.state.chunks;
    assert!(chunks.list_incomplete().await.unwrap().is_empty());
    assert!(chunks.list_assets().await.unwrap().is_empty());
    assert!(server.state.library().list_songs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_header_write_failure_discards_segments() {
    let server = TestServer::with_faulty_storage().await;
    server.faulty.as_ref().unwrap().fail_puts_after(1);

    let err = server
        .state
        .library()
        .upload(request(vec![1; 100]), UserId::new())
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            LibraryError::Storage(StorageError::WriteFailure {
                position: WritePosition::Header,
                ..
            })
        ),
        "{err:?}"
    );
    assert!(server.state.chunks.list_incomplete().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_asset_delete_failure_orphans_asset() {
    let server = TestServer::with_faulty_storage().await;
    let library = server.state.library();
    let owner = UserId::new();
    let song = committed(&server, owner).await;

    let faulty = server.faulty.as_ref().unwrap();
    faulty.fail_deletes(true);
    let outcome = library
        .delete_song(&song.id, &Requester::new(owner))
        .await
        .unwrap();
    assert!(
        matches!(outcome, DeleteOutcome::AssetOrphaned { .. }),
        "{outcome:?}"
    );

    // Song gone, asset left behind.
    assert!(matches!(
        library.get_song(&song.id).await.unwrap_err(),
        LibraryError::NotFound(_)
    ));
    assert!(server.state.chunks.head(&song.asset_id).await.is_ok());

    let report = library.find_orphans(time::Duration::ZERO).await.unwrap();
    assert_eq!(report.orphaned_assets, vec![song.asset_id]);

    faulty.fail_deletes(false);
    let stats = library.purge_orphans(&report).await;
    assert_eq!(stats.assets_deleted, 1);
    assert!(
        server
            .state
            .chunks
            .head(&song.asset_id)
            .await
            .unwrap_err()
            .is_not_found()
    );
}
