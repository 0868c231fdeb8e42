mod replication_worker_test;
